//! Prediction handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::logic::features::FeatureRow;
use crate::{AppResult, AppState};

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub features: FeatureRow,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub prediction: u8,
    pub churn_probability: f64,
    pub retention_probability: f64,
}

/// Normalize, score, and hand the event to the monitor without waiting on it
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(req) = payload?;
    let context = state.serving.current();
    let (_, result) = context.predict(&req.features)?;

    tracing::debug!(
        "Prediction: label={} churn_probability={:.4}",
        result.label,
        result.churn_probability
    );

    let monitor = state.monitor.clone();
    let features = req.features;
    tokio::task::spawn_blocking(move || monitor.record_prediction(features, &result));

    Ok(Json(PredictResponse {
        prediction: result.label,
        churn_probability: result.churn_probability,
        retention_probability: result.retention_probability,
    }))
}
