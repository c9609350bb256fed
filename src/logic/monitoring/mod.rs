//! Monitoring Module - prediction log, metrics history, drift and charts
//!
//! Layout under the monitoring directory:
//!
//! ```text
//! monitoring_logs/
//! ├── model_metrics.json          # MetricsHistory
//! ├── predictions-*.jsonl         # PredictionEvent per line
//! ├── alerts.log                  # written by the alerter
//! └── visualizations/
//!     ├── accuracy_trend.svg
//!     └── metrics_trend.svg
//! ```

pub mod predictions;
pub mod history;
pub mod drift;
pub mod charts;


use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;

use crate::logic::dataset::ReferenceDataset;
use crate::logic::features::FeatureRow;
use crate::logic::model::{BatchMetrics, ModelError, PredictionResult};

// Re-export common types
pub use predictions::{PredictionEvent, PredictionLog};
pub use history::{MetricsHistory, MetricsRecord, MetricsStore};
pub use drift::drift_score;

pub const METRICS_FILE: &str = "model_metrics.json";
pub const VISUALIZATIONS_DIR: &str = "visualizations";

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitoring storage error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Metrics(#[from] ModelError),
}

pub struct Monitor {
    log_dir: PathBuf,
    predictions: PredictionLog,
    metrics: MetricsStore,
    /// One chart writer at a time
    charts: Mutex<()>,
}

impl Monitor {
    pub fn new(log_dir: impl Into<PathBuf>) -> Result<Self, MonitorError> {
        let log_dir = log_dir.into();
        std::fs::create_dir_all(&log_dir)?;

        let metrics = MetricsStore::open(log_dir.join(METRICS_FILE))?;
        let predictions = PredictionLog::new(log_dir.clone());

        tracing::info!("Monitoring logs at {}", log_dir.display());

        Ok(Self {
            log_dir,
            predictions,
            metrics,
            charts: Mutex::new(()),
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Append a served prediction. Failures are logged, never returned.
    pub fn record_prediction(&self, features: FeatureRow, result: &PredictionResult) {
        let event = PredictionEvent::new(features, result.label, result.churn_probability);

        if let Err(e) = self.predictions.append(&event) {
            tracing::warn!("Failed to log prediction {}: {}", event.id, e);
        }
    }

    /// Score a labelled batch, append it to the history and refresh charts.
    /// Drift is computed when the encoded batch and its reference are given.
    pub fn record_batch_metrics(
        &self,
        y_true: &[u8],
        y_pred: &[u8],
        batch: Option<(&ReferenceDataset, &[Vec<f64>])>,
    ) -> Result<MetricsRecord, MonitorError> {
        let metrics = BatchMetrics::compute(y_true, y_pred)?;
        let drift = batch.and_then(|(reference, rows)| drift_score(reference, rows));

        let record = MetricsRecord::new(metrics, drift);
        self.metrics.append(&record)?;

        tracing::info!(
            "Batch metrics: accuracy={:.4} precision={:.4} recall={:.4} f1={:.4} n={} drift={:?}",
            record.accuracy,
            record.precision,
            record.recall,
            record.f1_score,
            record.prediction_count,
            record.data_drift_score
        );

        // charts always reflect the newest snapshot
        let _charts = self.charts.lock();
        let history = self.metrics.snapshot();
        if let Err(e) = charts::render_trends(&history, &self.log_dir.join(VISUALIZATIONS_DIR)) {
            tracing::warn!("Failed to render metric charts: {}", e);
        }

        Ok(record)
    }

    pub fn history(&self) -> MetricsHistory {
        self.metrics.snapshot()
    }

    pub fn prediction_log(&self) -> &PredictionLog {
        &self.predictions
    }
}
