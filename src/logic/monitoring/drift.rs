//! Data drift - relative shift of numeric column means

use crate::logic::dataset::{ColumnKind, ReferenceDataset};

/// Reference means smaller than this are skipped
const MIN_REFERENCE_MEAN: f64 = 1e-3;

/// Mean of `|batch_mean - ref_mean| / |ref_mean|` over the numeric columns.
/// Rows must be encoded in reference schema order. `None` for an empty batch
/// or when no column qualifies.
pub fn drift_score(reference: &ReferenceDataset, batch: &[Vec<f64>]) -> Option<f64> {
    if batch.is_empty() {
        return None;
    }

    let mut total = 0.0;
    let mut counted = 0usize;

    for (i, column) in reference.columns().iter().enumerate() {
        let ColumnKind::Numeric { mean: reference_mean } = column.kind else {
            continue;
        };
        if reference_mean.abs() < MIN_REFERENCE_MEAN {
            continue;
        }

        let values: Vec<f64> = batch.iter().filter_map(|row| row.get(i).copied()).collect();
        if values.is_empty() {
            continue;
        }

        let batch_mean = values.iter().sum::<f64>() / values.len() as f64;
        total += (batch_mean - reference_mean).abs() / reference_mean.abs();
        counted += 1;
    }

    (counted > 0).then(|| total / counted as f64)
}
