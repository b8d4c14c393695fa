//! Summary and quality endpoints consumed by the dashboard

use axum::{extract::State, Json};

use crate::error::ApiResult;
use crate::services::summary::{self, QualityReport, Summary};
use crate::AppState;

/// GET /summary
pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<Summary>> {
    Ok(Json(summary::summarize(&state.db).await?))
}

/// GET /quality
pub async fn get_quality(State(state): State<AppState>) -> ApiResult<Json<QualityReport>> {
    Ok(Json(summary::quality(&state.db).await?))
}
