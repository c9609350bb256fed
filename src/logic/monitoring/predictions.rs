//! Prediction Log - append-only JSONL of served predictions
//!
//! Files are named `predictions-<timestamp>.jsonl` and rotate once they
//! reach `MAX_FILE_SIZE`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::features::FeatureRow;

const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB
const FILE_PREFIX: &str = "predictions-";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub features: FeatureRow,
    pub prediction: u8,
    pub churn_probability: f64,
    pub actual: Option<u8>,
}

impl PredictionEvent {
    pub fn new(features: FeatureRow, prediction: u8, churn_probability: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            features,
            prediction,
            churn_probability,
            actual: None,
        }
    }
}

pub struct PredictionLog {
    file: Mutex<Option<File>>,
    base_dir: PathBuf,
    max_file_size: u64,
}

impl PredictionLog {
    pub fn new(base_dir: PathBuf) -> Self {
        Self::with_max_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: PathBuf, max_file_size: u64) -> Self {
        Self {
            file: Mutex::new(None),
            base_dir,
            max_file_size,
        }
    }

    /// Append one event, rotating when the current file is full
    pub fn append(&self, event: &PredictionEvent) -> io::Result<()> {
        let mut file_guard = self.file.lock();

        if file_guard.is_none() {
            fs::create_dir_all(&self.base_dir)?;
            let reusable = match self.find_latest_log_file()? {
                Some(path) => {
                    let f = OpenOptions::new().append(true).open(&path)?;
                    (f.metadata()?.len() < self.max_file_size).then_some(f)
                }
                None => None,
            };
            *file_guard = Some(match reusable {
                Some(f) => f,
                None => self.create_new_file()?,
            });
        }

        let should_rotate = match file_guard.as_ref() {
            Some(f) => f.metadata()?.len() >= self.max_file_size,
            None => false,
        };
        if should_rotate {
            *file_guard = Some(self.create_new_file()?);
        }

        if let Some(file) = file_guard.as_mut() {
            let json = serde_json::to_string(event)?;
            writeln!(file, "{}", json)?;
        }

        Ok(())
    }

    /// All log files, oldest first
    pub fn files(&self) -> io::Result<Vec<PathBuf>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.base_dir)?
            .filter_map(|res| res.ok())
            .map(|e| e.path())
            .filter(|p| is_log_file(p))
            .collect::<Vec<_>>();

        entries.sort();
        Ok(entries)
    }

    /// Read back every event, skipping lines that fail to parse
    pub fn read_all(&self) -> io::Result<Vec<PredictionEvent>> {
        let mut events = Vec::new();
        for path in self.files()? {
            let content = fs::read_to_string(&path)?;
            events.extend(content.lines().filter_map(|line| serde_json::from_str(line).ok()));
        }
        Ok(events)
    }

    fn create_new_file(&self) -> io::Result<File> {
        let stamp = Utc::now().format("%Y-%m-%d-%H%M%S%3f").to_string();

        // counter keeps same-millisecond rotations unique and sortable
        let mut n = 0u32;
        let mut path = self.base_dir.join(format!("{}{}-{:03}.jsonl", FILE_PREFIX, stamp, n));
        while path.exists() {
            n += 1;
            path = self.base_dir.join(format!("{}{}-{:03}.jsonl", FILE_PREFIX, stamp, n));
        }

        OpenOptions::new().create(true).append(true).open(path)
    }

    fn find_latest_log_file(&self) -> io::Result<Option<PathBuf>> {
        Ok(self.files()?.pop())
    }
}

fn is_log_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "jsonl")
        && path.file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| n.starts_with(FILE_PREFIX))
}
