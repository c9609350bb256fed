//! Monitoring handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::logic::monitoring::MetricsHistory;
use crate::logic::scheduler::EvaluationReport;
use crate::{AppError, AppResult, AppState};

#[derive(Serialize)]
pub struct AlertsResponse {
    alerts: Vec<String>,
}

/// Metrics history document
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsHistory> {
    Json(state.monitor.history())
}

pub async fn alerts(State(state): State<AppState>) -> AppResult<Json<AlertsResponse>> {
    let alerter = state.alerter.clone();
    let alerts = tokio::task::spawn_blocking(move || alerter.read_alerts())
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))??;

    Ok(Json(AlertsResponse { alerts }))
}

/// Run one evaluation now
pub async fn evaluate(State(state): State<AppState>) -> AppResult<Json<EvaluationReport>> {
    let report = state.evaluator.evaluate_once().await?;
    Ok(Json(report))
}
