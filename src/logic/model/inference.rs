//! Inference - persisted churn model
//!
//! The artifact carries the forest together with the feature order it was
//! trained on, so a server can refuse a model that does not match its
//! reference schema.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::{predict, Classifier, ModelError, PredictionResult, RandomForest};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("model artifact not found: {0}")]
    NotFound(String),

    #[error("failed to access model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed model artifact: {0}")]
    Format(#[from] serde_json::Error),

    #[error("corrupt model artifact: {0}")]
    Corrupt(String),

    #[error("model was trained on {model} features but the reference schema has {schema}")]
    SchemaMismatch { model: usize, schema: usize },

    #[error("model feature '{model}' does not match reference column '{schema}'")]
    FeatureMismatch { model: String, schema: String },
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// What goes to disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    pub target: String,
    pub trained_at: DateTime<Utc>,
    pub forest: RandomForest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

/// Model metadata for the API
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub path: Option<String>,
    pub checksum: String,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub n_features: usize,
    pub target: String,
    pub trained_at: DateTime<Utc>,
    pub loaded_at: DateTime<Utc>,
}

/// Loaded model, immutable once built
#[derive(Debug, Clone)]
pub struct ChurnModel {
    artifact: ModelArtifact,
    checksum: String,
    path: Option<PathBuf>,
    loaded_at: DateTime<Utc>,
}

impl ChurnModel {
    pub fn new(feature_names: Vec<String>, target: &str, forest: RandomForest) -> Self {
        let artifact = ModelArtifact {
            feature_names,
            target: target.to_string(),
            trained_at: Utc::now(),
            forest,
        };
        let checksum = serde_json::to_vec(&artifact)
            .map(|bytes| checksum(&bytes))
            .unwrap_or_default();

        Self {
            artifact,
            checksum,
            path: None,
            loaded_at: Utc::now(),
        }
    }

    /// Write the artifact as JSON
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let bytes = serde_json::to_vec(&self.artifact)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        fs::write(path, &bytes).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;

        tracing::info!("Model saved to {} (sha256 {})", path.display(), &checksum(&bytes)[..12]);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        tracing::info!("Loading model from: {}", path.display());

        if !path.exists() {
            return Err(ArtifactError::NotFound(path.display().to_string()));
        }

        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;

        artifact.forest.validate().map_err(ArtifactError::Corrupt)?;

        if artifact.feature_names.len() != artifact.forest.n_features() {
            return Err(ArtifactError::SchemaMismatch {
                model: artifact.forest.n_features(),
                schema: artifact.feature_names.len(),
            });
        }

        let model = Self {
            artifact,
            checksum: checksum(&bytes),
            path: Some(path.to_path_buf()),
            loaded_at: Utc::now(),
        };

        tracing::info!(
            "Model loaded: {} trees, {} features",
            model.artifact.forest.n_trees(),
            model.artifact.feature_names.len()
        );
        Ok(model)
    }

    /// Check the model's feature order against a reference schema
    pub fn ensure_schema(&self, schema: &[String]) -> Result<(), ArtifactError> {
        let names = &self.artifact.feature_names;
        if names.len() != schema.len() {
            return Err(ArtifactError::SchemaMismatch { model: names.len(), schema: schema.len() });
        }
        if let Some((model, column)) = names.iter().zip(schema).find(|(m, s)| m != s) {
            return Err(ArtifactError::FeatureMismatch {
                model: model.clone(),
                schema: column.clone(),
            });
        }
        Ok(())
    }

    pub fn predict(&self, row: &[f64]) -> Result<PredictionResult, ModelError> {
        predict(&self.artifact.forest, row)
    }

    pub fn forest(&self) -> &RandomForest {
        &self.artifact.forest
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifact.feature_names
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    /// Importances sorted from most to least important
    pub fn feature_importances(&self) -> Vec<FeatureImportance> {
        let mut importances: Vec<FeatureImportance> = self.artifact.feature_names
            .iter()
            .zip(self.artifact.forest.feature_importances())
            .map(|(name, &importance)| FeatureImportance { name: name.clone(), importance })
            .collect();

        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importances
    }

    pub fn metadata(&self) -> ModelMetadata {
        let params = self.artifact.forest.params();
        ModelMetadata {
            path: self.path.as_ref().map(|p| p.display().to_string()),
            checksum: self.checksum.clone(),
            n_estimators: self.artifact.forest.n_trees(),
            max_depth: params.max_depth,
            n_features: self.artifact.feature_names.len(),
            target: self.artifact.target.clone(),
            trained_at: self.artifact.trained_at,
            loaded_at: self.loaded_at,
        }
    }
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
