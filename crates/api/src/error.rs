//! API error types and handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use classhq_shared::StoreError;
use serde_json::json;

use crate::routing::ResolveError;
use crate::verify::VerifyError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    // Authentication
    #[error("Authentication required")]
    Unauthorized,
    #[error("Insufficient permissions")]
    Forbidden,

    // Validation
    #[error("Invalid request: {0}")]
    BadRequest(String),

    // Resources
    #[error("Resource not found")]
    NotFound,
    #[error("Resource already exists")]
    Conflict(String),

    // Tenancy: the hostname has no owning tenant, or the owner is inactive.
    // Callers must reject the request, never fall back to a default tenant.
    #[error("No tenant is registered for this hostname")]
    TenantNotFound,

    // Internal
    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", self.to_string()),

            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),

            ApiError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),

            ApiError::TenantNotFound => {
                (StatusCode::NOT_FOUND, "TENANT_NOT_FOUND", self.to_string())
            }

            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                self.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound,
            StoreError::Conflict(msg) => ApiError::Conflict(msg),
            StoreError::Unavailable(msg) => {
                tracing::error!(error = %msg, "Domain store unavailable");
                ApiError::ServiceUnavailable
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound => ApiError::TenantNotFound,
            // Fail closed: the request is rejected before business logic,
            // but as an outage rather than a missing tenant
            ResolveError::StoreUnavailable => ApiError::ServiceUnavailable,
        }
    }
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::NotFound => ApiError::NotFound,
            VerifyError::Store(e) => e.into(),
        }
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
