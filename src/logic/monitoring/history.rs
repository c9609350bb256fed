//! Metrics History - column-oriented batch metrics document
//!
//! Stored as one JSON object of parallel arrays, the layout the dashboard
//! reads. Writes go to a temp file that is then renamed over the target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::logic::model::BatchMetrics;

/// One batch evaluation
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MetricsRecord {
    pub timestamp: DateTime<Utc>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub prediction_count: usize,
    pub data_drift_score: Option<f64>,
}

impl MetricsRecord {
    pub fn new(metrics: BatchMetrics, data_drift_score: Option<f64>) -> Self {
        Self {
            timestamp: Utc::now(),
            accuracy: metrics.accuracy,
            precision: metrics.precision,
            recall: metrics.recall,
            f1_score: metrics.f1_score,
            prediction_count: metrics.prediction_count,
            data_drift_score,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsHistory {
    pub timestamps: Vec<DateTime<Utc>>,
    pub accuracy: Vec<f64>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    pub f1_score: Vec<f64>,
    pub prediction_count: Vec<usize>,
    pub data_drift_score: Vec<Option<f64>>,
}

impl MetricsHistory {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, record: &MetricsRecord) {
        self.timestamps.push(record.timestamp);
        self.accuracy.push(record.accuracy);
        self.precision.push(record.precision);
        self.recall.push(record.recall);
        self.f1_score.push(record.f1_score);
        self.prediction_count.push(record.prediction_count);
        self.data_drift_score.push(record.data_drift_score);
    }

    fn pop(&mut self) {
        self.timestamps.pop();
        self.accuracy.pop();
        self.precision.pop();
        self.recall.pop();
        self.f1_score.pop();
        self.prediction_count.pop();
        self.data_drift_score.pop();
    }

    /// Latest entry as a record
    pub fn latest(&self) -> Option<MetricsRecord> {
        let i = self.len().checked_sub(1)?;
        Some(MetricsRecord {
            timestamp: self.timestamps[i],
            accuracy: *self.accuracy.get(i)?,
            precision: *self.precision.get(i)?,
            recall: *self.recall.get(i)?,
            f1_score: *self.f1_score.get(i)?,
            prediction_count: *self.prediction_count.get(i)?,
            data_drift_score: self.data_drift_score.get(i).copied().flatten(),
        })
    }

    /// All arrays have the same length
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        [
            self.accuracy.len(),
            self.precision.len(),
            self.recall.len(),
            self.f1_score.len(),
            self.prediction_count.len(),
            self.data_drift_score.len(),
        ]
        .iter()
        .all(|&l| l == n)
    }
}

/// Single owner of the history file
pub struct MetricsStore {
    path: PathBuf,
    history: Mutex<MetricsHistory>,
}

impl MetricsStore {
    /// Open or initialize the history file
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let history = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let history: MetricsHistory = serde_json::from_str(&content)?;
            if !history.is_consistent() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("metrics history {} has arrays of different lengths", path.display()),
                ));
            }
            history
        } else {
            let history = MetricsHistory::default();
            write_atomic(&path, &history)?;
            history
        };

        Ok(Self {
            path,
            history: Mutex::new(history),
        })
    }

    /// Append and persist; the in-memory copy is rolled back if the write fails
    pub fn append(&self, record: &MetricsRecord) -> io::Result<MetricsHistory> {
        let mut history = self.history.lock();
        history.push(record);

        if let Err(e) = write_atomic(&self.path, &history) {
            history.pop();
            return Err(e);
        }

        Ok(history.clone())
    }

    pub fn snapshot(&self) -> MetricsHistory {
        self.history.lock().clone()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomic(path: &Path, history: &MetricsHistory) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(history)?)?;
    fs::rename(&tmp, path)
}
