//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{error::ApiError, state::AppState};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready only when the Domain Store answers
pub async fn readiness(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "Readiness check failed");
            ApiError::ServiceUnavailable
        })?;

    Ok(Json(json!({ "status": "ready" })))
}
