//! Feature Normalizer - loose client payload -> model-ready row
//!
//! Walks the reference schema in order, takes the client value when one is
//! given and falls back to the reference mean/mode otherwise, then coerces
//! every value to the numeric encoding the model was trained on.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::dataset::{boolean_flag, ColumnKind, ColumnSpec, EncodingError, ReferenceDataset};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// A single client-supplied feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Arrays and objects; only an error when sent for a schema column
    Other(serde_json::Value),
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Null => write!(f, "null"),
            FeatureValue::Bool(b) => write!(f, "{}", b),
            FeatureValue::Number(n) => write!(f, "{}", n),
            FeatureValue::Text(s) => write!(f, "\"{}\"", s),
            FeatureValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// Sparse feature map as sent by clients
pub type FeatureRow = BTreeMap<String, FeatureValue>;

/// Row aligned to the reference schema
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub values: Vec<f64>,
    /// Columns filled from reference statistics
    pub filled: Vec<String>,
}

/// How many absent features a request may rely on being filled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissingFeaturePolicy {
    pub max_missing_ratio: f64,
}

impl Default for MissingFeaturePolicy {
    fn default() -> Self {
        Self { max_missing_ratio: 0.5 }
    }
}

impl MissingFeaturePolicy {
    pub fn allows(&self, missing: usize, expected: usize) -> bool {
        missing as f64 <= self.max_missing_ratio * expected as f64
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizeError {
    #[error("too many missing features: {missing} of {expected} not provided (at most {allowed} may be omitted)")]
    TooManyMissing {
        missing: usize,
        expected: usize,
        allowed: usize,
    },

    #[error("feature '{column}' must be numeric, got {value}")]
    InvalidNumber { column: String, value: String },

    #[error("feature '{column}' must be a number, string or boolean, got {value}")]
    InvalidType { column: String, value: String },

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct FeatureNormalizer<'a> {
    reference: &'a ReferenceDataset,
    policy: MissingFeaturePolicy,
}

impl<'a> FeatureNormalizer<'a> {
    pub fn new(reference: &'a ReferenceDataset, policy: MissingFeaturePolicy) -> Self {
        Self { reference, policy }
    }

    pub fn normalize(&self, input: &FeatureRow) -> Result<NormalizedRow, NormalizeError> {
        let columns = self.reference.columns();

        let missing: Vec<&ColumnSpec> = columns
            .iter()
            .filter(|c| matches!(input.get(&c.name), None | Some(FeatureValue::Null)))
            .collect();

        if !self.policy.allows(missing.len(), columns.len()) {
            return Err(NormalizeError::TooManyMissing {
                missing: missing.len(),
                expected: columns.len(),
                allowed: (self.policy.max_missing_ratio * columns.len() as f64).floor() as usize,
            });
        }

        for key in input.keys() {
            if !columns.iter().any(|c| &c.name == key) {
                tracing::debug!("Ignoring unknown feature '{}'", key);
            }
        }

        let mut values = Vec::with_capacity(columns.len());
        let mut filled = Vec::new();

        for column in columns {
            let value = match input.get(&column.name) {
                Some(value) if *value != FeatureValue::Null => coerce(column, value)?,
                _ => {
                    filled.push(column.name.clone());
                    fill_value(column)?
                }
            };
            values.push(value);
        }

        if !filled.is_empty() {
            tracing::debug!("Filled {} missing features from reference: {:?}", filled.len(), filled);
        }

        Ok(NormalizedRow { values, filled })
    }
}

/// Reference statistic for an absent column
fn fill_value(column: &ColumnSpec) -> Result<f64, NormalizeError> {
    match &column.kind {
        ColumnKind::Numeric { mean } => Ok(*mean),
        ColumnKind::BooleanLike { mode } => Ok(boolean_flag(mode)),
        ColumnKind::Categorical { mode, encoder } => Ok(encoder.transform(mode)? as f64),
    }
}

/// Client value -> model encoding
fn coerce(column: &ColumnSpec, value: &FeatureValue) -> Result<f64, NormalizeError> {
    let invalid = || NormalizeError::InvalidNumber {
        column: column.name.clone(),
        value: value.to_string(),
    };

    match (&column.kind, value) {
        (_, FeatureValue::Other(_)) => Err(NormalizeError::InvalidType {
            column: column.name.clone(),
            value: value.to_string(),
        }),

        (ColumnKind::Numeric { .. }, FeatureValue::Number(n)) if n.is_finite() => Ok(*n),
        (ColumnKind::Numeric { .. }, FeatureValue::Text(s)) => s.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(invalid),
        (ColumnKind::Numeric { .. }, _) => Err(invalid()),

        (ColumnKind::BooleanLike { .. }, FeatureValue::Text(s)) => Ok(boolean_flag(s)),
        (ColumnKind::BooleanLike { .. }, FeatureValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        (ColumnKind::BooleanLike { .. }, FeatureValue::Number(n)) => Ok(if *n != 0.0 { 1.0 } else { 0.0 }),
        (ColumnKind::BooleanLike { .. }, FeatureValue::Null) => Ok(0.0),

        (ColumnKind::Categorical { encoder, .. }, value) => {
            let text = match value {
                FeatureValue::Text(s) => s.trim().to_string(),
                scalar => scalar.to_string(),
            };
            Ok(encoder.transform(&text)? as f64)
        }
    }
}
