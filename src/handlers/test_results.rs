//! Test results handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::logic::reporting::TestReport;
use crate::{AppError, AppResult, AppState};

pub async fn latest(State(state): State<AppState>) -> AppResult<Json<TestReport>> {
    state.test_results
        .latest()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No test results available".to_string()))
}

pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<TestReport>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(report) = payload?;
    let store = state.test_results.clone();
    tokio::task::spawn_blocking(move || store.store(report))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))??;

    Ok(StatusCode::CREATED)
}
