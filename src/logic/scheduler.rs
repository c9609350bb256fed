//! Scheduled Evaluator - periodic re-scoring on the held-out dataset
//!
//! Runs once immediately, then every interval. Each run records batch
//! metrics and hands them to the alerter. Failures are logged and the loop
//! keeps going.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::logic::alerting::{AlertOutcome, Alerter};
use crate::logic::dataset::{DatasetError, RawTable};
use crate::logic::model::{predict_labels, ModelError};
use crate::logic::monitoring::{MetricsRecord, Monitor, MonitorError};
use crate::logic::serving::ServingState;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("model is not loaded")]
    ModelUnavailable,

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error("evaluation task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub metrics: MetricsRecord,
    pub alert: AlertOutcome,
}

#[derive(Clone)]
pub struct Evaluator {
    serving: Arc<ServingState>,
    monitor: Arc<Monitor>,
    alerter: Arc<Alerter>,
    test_path: PathBuf,
}

impl Evaluator {
    pub fn new(serving: Arc<ServingState>, monitor: Arc<Monitor>, alerter: Arc<Alerter>, test_path: PathBuf) -> Self {
        Self {
            serving,
            monitor,
            alerter,
            test_path,
        }
    }

    /// Score the held-out set with the current model, record, alert
    pub async fn evaluate_once(&self) -> Result<EvaluationReport, EvaluationError> {
        tracing::info!("Running model evaluation on {}", self.test_path.display());

        let context = self.serving.current();
        let monitor = self.monitor.clone();
        let test_path = self.test_path.clone();

        let metrics = tokio::task::spawn_blocking(move || -> Result<MetricsRecord, EvaluationError> {
            let model = context.model().ok_or(EvaluationError::ModelUnavailable)?;
            let reference = context.reference();

            let table = RawTable::from_path(&test_path)?;
            let (x, y) = reference.encode_table(&table)?;
            let predicted = predict_labels(model.forest(), &x)?;

            Ok(monitor.record_batch_metrics(&y, &predicted, Some((reference, &x)))?)
        })
        .await
        .map_err(|e| EvaluationError::Task(e.to_string()))??;

        let alert = self.alerter.check(&metrics).await;

        tracing::info!("Evaluation complete. Accuracy: {:.4}", metrics.accuracy);
        Ok(EvaluationReport { metrics, alert })
    }

    /// Background loop; a zero interval means run once and stop
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            if interval.is_zero() {
                self.run_logged().await;
                return;
            }

            tracing::info!("Scheduled model evaluation every {:?}", interval);

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // first tick completes immediately
                ticker.tick().await;
                self.run_logged().await;
            }
        })
    }

    async fn run_logged(&self) {
        if let Err(e) = self.evaluate_once().await {
            tracing::error!("Scheduled evaluation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::logic::alerting::AlertConfig;
    use crate::logic::dataset::fixtures::write_churn_csv;
    use crate::logic::dataset::{DatasetOptions, ReferenceDataset};
    use crate::logic::features::MissingFeaturePolicy;
    use crate::logic::model::{ChurnModel, ForestParams, RandomForest};
    use crate::logic::serving::ServingSources;

    fn evaluator(dir: &std::path::Path, with_model: bool) -> Evaluator {
        let sources = ServingSources {
            reference_path: write_churn_csv(dir, "train.csv", 300, 1),
            model_path: dir.join("model.json"),
            dataset: DatasetOptions::default(),
            policy: MissingFeaturePolicy::default(),
        };

        if with_model {
            let reference = ReferenceDataset::load(&sources.reference_path, &sources.dataset).unwrap();
            let params = ForestParams { n_estimators: 15, max_depth: 8, ..ForestParams::default() };
            let forest = RandomForest::fit(reference.features(), reference.labels(), params).unwrap();
            ChurnModel::new(reference.schema(), reference.target(), forest)
                .save(&sources.model_path)
                .unwrap();
        }

        let test_path = write_churn_csv(dir, "test.csv", 80, 2);
        let logs = dir.join("logs");

        Evaluator::new(
            Arc::new(ServingState::load(sources).unwrap()),
            Arc::new(Monitor::new(&logs).unwrap()),
            Arc::new(Alerter::new(AlertConfig::default(), &logs)),
            test_path,
        )
    }

    #[tokio::test]
    async fn test_evaluate_once_records_metrics() {
        let dir = tempdir().unwrap();
        let evaluator = evaluator(dir.path(), true);

        let report = evaluator.evaluate_once().await.unwrap();

        assert_eq!(report.metrics.prediction_count, 80);
        assert!(report.metrics.accuracy > 0.7);
        assert!(report.metrics.data_drift_score.is_some());
        assert_eq!(evaluator.monitor.history().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_without_model_fails() {
        let dir = tempdir().unwrap();
        let evaluator = evaluator(dir.path(), false);

        assert!(matches!(
            evaluator.evaluate_once().await,
            Err(EvaluationError::ModelUnavailable)
        ));
        assert!(evaluator.monitor.history().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_runs_immediately() {
        let dir = tempdir().unwrap();
        let evaluator = evaluator(dir.path(), true);
        let monitor = evaluator.monitor.clone();

        let handle = evaluator.spawn(Duration::from_secs(3600));
        for _ in 0..100 {
            if !monitor.history().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        handle.abort();

        assert_eq!(monitor.history().len(), 1);
    }
}
