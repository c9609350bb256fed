//! Admin handlers

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AppError, AppResult, AppState};

#[derive(Serialize)]
pub struct ReloadResponse {
    model_loaded: bool,
    reference_rows: usize,
    loaded_at: DateTime<Utc>,
}

/// Rebuild the serving context from disk and swap it in
pub async fn reload(State(state): State<AppState>) -> AppResult<Json<ReloadResponse>> {
    let serving = state.serving.clone();
    let context = tokio::task::spawn_blocking(move || serving.reload())
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))??;

    Ok(Json(ReloadResponse {
        model_loaded: context.model_loaded(),
        reference_rows: context.reference().len(),
        loaded_at: context.loaded_at(),
    }))
}
