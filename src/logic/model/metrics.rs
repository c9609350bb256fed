//! Binary classification metrics (positive class = churn)

use serde::{Deserialize, Serialize};

use super::ModelError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct BatchMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub prediction_count: usize,
}

impl BatchMetrics {
    /// Undefined ratios (zero denominators) are reported as 0
    pub fn compute(y_true: &[u8], y_pred: &[u8]) -> Result<Self, ModelError> {
        if y_true.len() != y_pred.len() {
            return Err(ModelError::LengthMismatch { rows: y_pred.len(), labels: y_true.len() });
        }

        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        for (&truth, &pred) in y_true.iter().zip(y_pred) {
            match (truth == 1, pred == 1) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
                (false, false) => {}
            }
            if (truth == 1) == (pred == 1) {
                correct += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Ok(Self {
            accuracy: ratio(correct, y_true.len()),
            precision,
            recall,
            f1_score,
            prediction_count: y_pred.len(),
        })
    }
}
