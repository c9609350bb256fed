//! Training Pipeline - prepare, train, evaluate, persist
//!
//! Encoders are fitted on the training CSV and reused for the test CSV, so
//! both sides share one numeric encoding.

use std::path::Path;

use thiserror::Error;

use crate::logic::dataset::{DatasetError, DatasetOptions, RawTable, ReferenceDataset};
use crate::logic::features::resolve_schema_from_path;
use crate::logic::model::{
    predict_labels, ArtifactError, BatchMetrics, ChurnModel, ForestParams, ModelError, RandomForest,
};

/// How many importances `train_model` logs
const TOP_FEATURES: usize = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Encoded train/test split
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub reference: ReferenceDataset,
    pub x_train: Vec<Vec<f64>>,
    pub y_train: Vec<u8>,
    pub x_test: Vec<Vec<f64>>,
    pub y_test: Vec<u8>,
}

impl PreparedData {
    pub fn feature_names(&self) -> Vec<String> {
        self.reference.schema()
    }
}

/// Load both CSVs, fitting encoders on the training set
pub fn prepare_data(
    train_path: &Path,
    test_path: &Path,
    options: &DatasetOptions,
) -> Result<PreparedData, PipelineError> {
    let reference = ReferenceDataset::load(train_path, options)?;

    let test_schema = resolve_schema_from_path(test_path, reference.target())?;
    let schema = reference.schema();
    if test_schema != schema {
        let extra: Vec<&String> = test_schema.iter().filter(|c| !schema.contains(c)).collect();
        tracing::warn!(
            "Test data columns differ from training data (extra: {:?}); extra columns are ignored",
            extra
        );
    }

    let test_table = RawTable::from_path(test_path)?;
    let (x_test, y_test) = reference.encode_table(&test_table)?;

    tracing::info!(
        "Prepared data: {} training rows, {} test rows, {} features",
        reference.len(),
        x_test.len(),
        reference.schema().len()
    );

    Ok(PreparedData {
        x_train: reference.features().to_vec(),
        y_train: reference.labels().to_vec(),
        x_test,
        y_test,
        reference,
    })
}

pub fn train_model(data: &PreparedData, params: ForestParams) -> Result<ChurnModel, PipelineError> {
    tracing::info!(
        "Training random forest (trees: {}, max_depth: {})",
        params.n_estimators,
        params.max_depth
    );

    let forest = RandomForest::fit(&data.x_train, &data.y_train, params)?;
    let model = ChurnModel::new(data.feature_names(), data.reference.target(), forest);

    tracing::info!("Top {} most important features:", TOP_FEATURES);
    for (rank, feature) in model.feature_importances().iter().take(TOP_FEATURES).enumerate() {
        tracing::info!("  {}. {:<28} {:.4}", rank + 1, feature.name, feature.importance);
    }

    Ok(model)
}

/// Accuracy on the given rows
pub fn evaluate_model(model: &ChurnModel, x: &[Vec<f64>], y: &[u8]) -> Result<f64, PipelineError> {
    Ok(batch_metrics(model, x, y)?.accuracy)
}

/// Full metric set on the given rows
pub fn batch_metrics(model: &ChurnModel, x: &[Vec<f64>], y: &[u8]) -> Result<BatchMetrics, PipelineError> {
    let predicted = predict_labels(model.forest(), x)?;
    let metrics = BatchMetrics::compute(y, &predicted)?;

    tracing::info!("Model accuracy: {:.4}", metrics.accuracy);
    Ok(metrics)
}

pub fn save_model(model: &ChurnModel, path: &Path) -> Result<(), PipelineError> {
    model.save(path)?;
    Ok(())
}

pub fn load_model(path: &Path) -> Result<ChurnModel, PipelineError> {
    Ok(ChurnModel::load(path)?)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::logic::dataset::fixtures::write_churn_csv;

    fn params() -> ForestParams {
        ForestParams { n_estimators: 20, max_depth: 8, ..ForestParams::default() }
    }

    #[test]
    fn test_full_pipeline_round_trip() {
        let dir = tempdir().unwrap();
        let train = write_churn_csv(dir.path(), "train.csv", 400, 1);
        let test = write_churn_csv(dir.path(), "test.csv", 100, 2);

        let data = prepare_data(&train, &test, &DatasetOptions::default()).unwrap();
        assert_eq!(data.x_train.len(), 400);
        assert_eq!(data.x_test.len(), 100);
        assert_eq!(data.x_test[0].len(), data.feature_names().len());

        let model = train_model(&data, params()).unwrap();
        let accuracy = evaluate_model(&model, &data.x_test, &data.y_test).unwrap();
        assert!(accuracy > 0.8, "held-out accuracy too low: {}", accuracy);

        let path = dir.path().join("model.json");
        save_model(&model, &path).unwrap();
        let loaded = load_model(&path).unwrap();

        let reloaded_accuracy = evaluate_model(&loaded, &data.x_test, &data.y_test).unwrap();
        assert_eq!(accuracy, reloaded_accuracy);
    }

    #[test]
    fn test_unseen_test_category_fails() {
        let dir = tempdir().unwrap();
        let train = write_churn_csv(dir.path(), "train.csv", 50, 1);
        let test = dir.path().join("test.csv");
        let mut csv = std::fs::read_to_string(&train).unwrap();
        csv = csv.replacen("\nCA,", "\nZZ,", 1);
        std::fs::write(&test, csv).unwrap();

        let err = prepare_data(&train, &test, &DatasetOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(DatasetError::Encoding(_))));
    }

    #[test]
    fn test_test_file_without_target_fails_early() {
        let dir = tempdir().unwrap();
        let train = write_churn_csv(dir.path(), "train.csv", 50, 1);
        let test = dir.path().join("test.csv");
        std::fs::write(&test, "State,Account length\nNY,100\n").unwrap();

        let err = prepare_data(&train, &test, &DatasetOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Dataset(DatasetError::MissingTarget(ref t)) if t == "Churn"));
    }

    #[test]
    fn test_load_model_missing_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load_model(&dir.path().join("model.json")),
            Err(PipelineError::Artifact(ArtifactError::NotFound(_)))
        ));
    }
}
