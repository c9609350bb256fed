//! Model metadata handler

use axum::{extract::State, Json};

use crate::logic::model::ModelMetadata;
use crate::{AppError, AppResult, AppState};

pub async fn metadata(State(state): State<AppState>) -> AppResult<Json<ModelMetadata>> {
    let context = state.serving.current();
    let model = context.model().ok_or(AppError::ModelUnavailable)?;

    Ok(Json(model.metadata()))
}
