//! Reference Dataset - typed view of the training CSV
//!
//! Derives everything serving needs from the training data: the ordered
//! schema, fill-in statistics and fitted encoders. Built once and shared
//! read-only afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use super::encoder::{EncodingError, LabelEncoder};
use crate::logic::features::schema::resolve_schema;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("target column '{0}' not found in dataset header")]
    MissingTarget(String),

    #[error("column '{0}' missing from dataset")]
    MissingColumn(String),

    #[error("dataset {0} contains no rows")]
    Empty(String),

    #[error("row {row}: invalid label '{value}'")]
    InvalidLabel { row: usize, value: String },

    #[error("row {row}: non-numeric value '{value}' in numeric column '{column}'")]
    NotNumeric { row: usize, column: String, value: String },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

// ============================================================================
// RAW TABLE
// ============================================================================

/// Untyped CSV contents, cells trimmed
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let csv_error = |source: csv::Error| DatasetError::Csv {
            path: path.display().to_string(),
            source,
        };

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(csv_error)?;

        let headers = reader.headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_error)?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        if rows.is_empty() {
            return Err(DatasetError::Empty(path.display().to_string()));
        }

        Ok(Self { headers, rows })
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

// ============================================================================
// COLUMN TYPES
// ============================================================================

/// How a schema column is interpreted, with the statistics used to fill it
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric { mean: f64 },
    BooleanLike { mode: String },
    Categorical { mode: String, encoder: LabelEncoder },
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ColumnKind,
}

/// Dataset loading knobs
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    pub target: String,
    /// Text columns holding yes/no answers
    pub boolean_columns: Vec<String>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            target: "Churn".to_string(),
            boolean_columns: vec![
                "International plan".to_string(),
                "Voice mail plan".to_string(),
            ],
        }
    }
}

/// "yes" (any case) is 1, everything else 0
pub fn boolean_flag(text: &str) -> f64 {
    if text.trim().eq_ignore_ascii_case("yes") { 1.0 } else { 0.0 }
}

/// Parse a churn label cell
pub fn parse_label(text: &str) -> Option<u8> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "1.0" => Some(1),
        "false" | "no" | "0" | "0.0" => Some(0),
        _ => None,
    }
}

// ============================================================================
// REFERENCE DATASET
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    target: String,
    columns: Vec<ColumnSpec>,
    features: Vec<Vec<f64>>,
    labels: Vec<u8>,
}

impl ReferenceDataset {
    pub fn load(path: &Path, options: &DatasetOptions) -> Result<Self, DatasetError> {
        let table = RawTable::from_path(path)?;
        Self::from_table(&table, options)
    }

    pub fn from_table(table: &RawTable, options: &DatasetOptions) -> Result<Self, DatasetError> {
        let schema = resolve_schema(&table.headers, &options.target)?;

        let columns = schema
            .iter()
            .map(|name| -> Result<ColumnSpec, DatasetError> {
                let index = table.column_index(name)
                    .ok_or_else(|| DatasetError::MissingColumn(name.clone()))?;
                let cells: Vec<&str> = table.rows.iter()
                    .map(|row| row.get(index).map(String::as_str).unwrap_or(""))
                    .collect();
                let boolean_like = options.boolean_columns.iter().any(|c| c == name);

                Ok(ColumnSpec {
                    name: name.clone(),
                    kind: infer_kind(name, &cells, boolean_like),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut dataset = Self {
            target: options.target.clone(),
            columns,
            features: Vec::new(),
            labels: Vec::new(),
        };

        let (features, labels) = dataset.encode_table(table)?;
        dataset.features = features;
        dataset.labels = labels;

        tracing::debug!(
            "Reference dataset ready: {} rows, {} features",
            dataset.labels.len(),
            dataset.columns.len()
        );

        Ok(dataset)
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Ordered feature names the model expects
    pub fn schema(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Encode another table (e.g. the held-out split) with this dataset's
    /// column types and encoders
    pub fn encode_table(&self, table: &RawTable) -> Result<(Vec<Vec<f64>>, Vec<u8>), DatasetError> {
        let target_index = table.column_index(&self.target)
            .ok_or_else(|| DatasetError::MissingTarget(self.target.clone()))?;

        let indices = self.columns
            .iter()
            .map(|c| table.column_index(&c.name).ok_or_else(|| DatasetError::MissingColumn(c.name.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let mut features = Vec::with_capacity(table.rows.len());
        let mut labels = Vec::with_capacity(table.rows.len());

        for (row_number, row) in table.rows.iter().enumerate() {
            let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

            let label = parse_label(cell(target_index)).ok_or_else(|| DatasetError::InvalidLabel {
                row: row_number,
                value: cell(target_index).to_string(),
            })?;

            let encoded = self.columns
                .iter()
                .zip(&indices)
                .map(|(spec, &i)| encode_cell(spec, cell(i), row_number))
                .collect::<Result<Vec<_>, _>>()?;

            features.push(encoded);
            labels.push(label);
        }

        Ok((features, labels))
    }
}

fn encode_cell(spec: &ColumnSpec, value: &str, row: usize) -> Result<f64, DatasetError> {
    match &spec.kind {
        ColumnKind::Numeric { .. } => value.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| DatasetError::NotNumeric {
                row,
                column: spec.name.clone(),
                value: value.to_string(),
            }),
        ColumnKind::BooleanLike { .. } => Ok(boolean_flag(value)),
        ColumnKind::Categorical { encoder, .. } => Ok(encoder.transform(value)? as f64),
    }
}

fn infer_kind(name: &str, cells: &[&str], boolean_like: bool) -> ColumnKind {
    let numeric: Option<Vec<f64>> = cells.iter()
        .map(|c| c.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();

    match numeric {
        Some(values) if !values.is_empty() => {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            ColumnKind::Numeric { mean }
        }
        _ if boolean_like => ColumnKind::BooleanLike { mode: mode(cells) },
        _ => ColumnKind::Categorical {
            mode: mode(cells),
            encoder: LabelEncoder::fit(name, cells.iter().copied()),
        },
    }
}

/// Most frequent value, ties broken by the smallest value
fn mode(cells: &[&str]) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for cell in cells {
        *counts.entry(*cell).or_default() += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }

    best.map(|(value, _)| value.to_string()).unwrap_or_default()
}
