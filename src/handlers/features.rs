//! Feature importance handler

use axum::{extract::State, Json};

use crate::logic::model::FeatureImportance;
use crate::{AppError, AppResult, AppState};

/// Importances sorted most important first
pub async fn importances(State(state): State<AppState>) -> AppResult<Json<Vec<FeatureImportance>>> {
    let context = state.serving.current();
    let model = context.model().ok_or(AppError::ModelUnavailable)?;

    Ok(Json(model.feature_importances()))
}
