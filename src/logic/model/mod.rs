//! Model Module - churn classifier, artifact and evaluation
//!
//! The forest is trained offline by the pipeline, persisted as a JSON
//! artifact and loaded read-only by the server.

pub mod tree;
pub mod forest;
pub mod inference;
pub mod metrics;


use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export common types
pub use forest::{ForestParams, RandomForest};
pub use inference::{ArtifactError, ChurnModel, FeatureImportance, ModelArtifact, ModelMetadata};
pub use metrics::BatchMetrics;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    #[error("cannot train on an empty dataset")]
    EmptyTrainingSet,

    #[error("{rows} feature rows but {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("row {row} has {got} features, expected {expected}")]
    RowWidth { row: usize, expected: usize, got: usize },

    #[error("invalid model parameters: {0}")]
    InvalidParams(String),
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Anything that scores a numeric row with a churn probability
pub trait Classifier {
    fn n_features(&self) -> usize;
    fn churn_probability(&self, row: &[f64]) -> f64;
}

/// Prediction output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PredictionResult {
    pub label: u8,
    pub churn_probability: f64,
    pub retention_probability: f64,
}

/// Score one normalized row
pub fn predict<C: Classifier + ?Sized>(classifier: &C, row: &[f64]) -> Result<PredictionResult, ModelError> {
    if row.len() != classifier.n_features() {
        return Err(ModelError::RowWidth {
            row: 0,
            expected: classifier.n_features(),
            got: row.len(),
        });
    }

    let churn_probability = classifier.churn_probability(row).clamp(0.0, 1.0);

    Ok(PredictionResult {
        label: u8::from(churn_probability > 0.5),
        churn_probability,
        retention_probability: 1.0 - churn_probability,
    })
}

/// Score a batch, returning labels only
pub fn predict_labels<C: Classifier + ?Sized>(classifier: &C, rows: &[Vec<f64>]) -> Result<Vec<u8>, ModelError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            predict(classifier, row)
                .map(|p| p.label)
                .map_err(|e| match e {
                    ModelError::RowWidth { expected, got, .. } => ModelError::RowWidth { row: i, expected, got },
                    other => other,
                })
        })
        .collect()
}
