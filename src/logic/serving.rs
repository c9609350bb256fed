//! Serving State - reference data and model shared by all requests
//!
//! The context is immutable. A reload builds a complete replacement and
//! swaps the `Arc`, so in-flight requests finish on the context they cloned.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::logic::dataset::{DatasetError, DatasetOptions, ReferenceDataset};
use crate::logic::features::{FeatureNormalizer, FeatureRow, MissingFeaturePolicy, NormalizeError};
use crate::logic::model::{ArtifactError, ChurnModel, ModelError, PredictionResult};

#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error("model is not loaded")]
    ModelUnavailable,

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Where the context is built from
#[derive(Debug, Clone)]
pub struct ServingSources {
    pub reference_path: PathBuf,
    pub model_path: PathBuf,
    pub dataset: DatasetOptions,
    pub policy: MissingFeaturePolicy,
}

#[derive(Debug)]
pub struct ServingContext {
    reference: ReferenceDataset,
    model: Option<ChurnModel>,
    policy: MissingFeaturePolicy,
    loaded_at: DateTime<Utc>,
}

impl ServingContext {
    pub fn new(reference: ReferenceDataset, model: Option<ChurnModel>, policy: MissingFeaturePolicy) -> Self {
        Self {
            reference,
            model,
            policy,
            loaded_at: Utc::now(),
        }
    }

    /// Load the reference dataset (required) and the model (optional: the
    /// service still starts without one and reports it unavailable)
    pub fn load(sources: &ServingSources) -> Result<Self, DatasetError> {
        let reference = ReferenceDataset::load(&sources.reference_path, &sources.dataset)?;

        let model = match ChurnModel::load(&sources.model_path) {
            Ok(model) => match model.ensure_schema(&reference.schema()) {
                Ok(()) => Some(model),
                Err(e) => {
                    tracing::error!("Model does not match the reference dataset: {}", e);
                    None
                }
            },
            Err(ArtifactError::NotFound(path)) => {
                tracing::warn!("No model artifact at {}, predictions disabled", path);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load model: {}", e);
                None
            }
        };

        Ok(Self::new(reference, model, sources.policy))
    }

    pub fn reference(&self) -> &ReferenceDataset {
        &self.reference
    }

    pub fn model(&self) -> Option<&ChurnModel> {
        self.model.as_ref()
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Normalize a client payload and score it
    pub fn predict(&self, features: &FeatureRow) -> Result<(Vec<f64>, PredictionResult), PredictError> {
        let model = self.model.as_ref().ok_or(PredictError::ModelUnavailable)?;

        let row = FeatureNormalizer::new(&self.reference, self.policy).normalize(features)?;
        let result = model.predict(&row.values)?;

        Ok((row.values, result))
    }
}

/// Swappable handle to the current context
#[derive(Debug)]
pub struct ServingState {
    sources: ServingSources,
    current: RwLock<Arc<ServingContext>>,
}

impl ServingState {
    pub fn new(sources: ServingSources, context: ServingContext) -> Self {
        Self {
            sources,
            current: RwLock::new(Arc::new(context)),
        }
    }

    pub fn load(sources: ServingSources) -> Result<Self, DatasetError> {
        let context = ServingContext::load(&sources)?;
        Ok(Self::new(sources, context))
    }

    /// Snapshot; the lock is released on return
    pub fn current(&self) -> Arc<ServingContext> {
        self.current.read().clone()
    }

    /// Rebuild from disk and swap. On failure the old context stays.
    pub fn reload(&self) -> Result<Arc<ServingContext>, DatasetError> {
        let context = Arc::new(ServingContext::load(&self.sources)?);
        *self.current.write() = context.clone();

        tracing::info!(
            "Serving context reloaded (model loaded: {})",
            context.model_loaded()
        );
        Ok(context)
    }

    pub fn sources(&self) -> &ServingSources {
        &self.sources
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::logic::dataset::fixtures::{known_good_record, write_churn_csv};
    use crate::logic::features::FeatureValue;
    use crate::logic::model::{ForestParams, RandomForest};

    fn sources(dir: &std::path::Path) -> ServingSources {
        ServingSources {
            reference_path: write_churn_csv(dir, "train.csv", 150, 4),
            model_path: dir.join("model.json"),
            dataset: DatasetOptions::default(),
            policy: MissingFeaturePolicy::default(),
        }
    }

    fn train_and_save(sources: &ServingSources) {
        let reference = ReferenceDataset::load(&sources.reference_path, &sources.dataset).unwrap();
        let params = ForestParams { n_estimators: 10, max_depth: 5, ..ForestParams::default() };
        let forest = RandomForest::fit(reference.features(), reference.labels(), params).unwrap();
        ChurnModel::new(reference.schema(), reference.target(), forest)
            .save(&sources.model_path)
            .unwrap();
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let dir = tempdir().unwrap();
        let state = ServingState::load(sources(dir.path())).unwrap();

        let ctx = state.current();
        assert!(!ctx.model_loaded());
        assert!(matches!(ctx.predict(&known_good_record()), Err(PredictError::ModelUnavailable)));
    }

    #[test]
    fn test_reload_swaps_context() {
        let dir = tempdir().unwrap();
        let src = sources(dir.path());
        let state = ServingState::load(src.clone()).unwrap();
        let before = state.current();

        train_and_save(&src);
        state.reload().unwrap();

        // the old snapshot is untouched
        assert!(!before.model_loaded());
        let after = state.current();
        assert!(after.model_loaded());

        let (row, result) = after.predict(&known_good_record()).unwrap();
        assert_eq!(row.len(), 19);
        assert!((result.churn_probability + result.retention_probability - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_failed_reload_keeps_old_context() {
        let dir = tempdir().unwrap();
        let src = sources(dir.path());
        train_and_save(&src);
        let state = ServingState::load(src.clone()).unwrap();

        std::fs::remove_file(&src.reference_path).unwrap();
        assert!(state.reload().is_err());
        assert!(state.current().model_loaded());
    }

    #[test]
    fn test_predict_surfaces_normalize_errors() {
        let dir = tempdir().unwrap();
        let src = sources(dir.path());
        train_and_save(&src);
        let state = ServingState::load(src).unwrap();

        let mut record = known_good_record();
        record.insert("State".into(), FeatureValue::Text("Atlantis".into()));

        assert!(matches!(
            state.current().predict(&record),
            Err(PredictError::Normalize(NormalizeError::Encoding(_)))
        ));
    }
}
