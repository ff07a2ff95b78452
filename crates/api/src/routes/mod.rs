//! API routes

pub mod context;
pub mod domains;
pub mod health;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use subtle::ConstantTimeEq;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    error::ApiError,
    routing::CacheStats,
    state::AppState,
    tenancy,
};

/// Admin requests carry a shared token; comparison is constant-time.
/// Identity and role management live outside this service.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = req
        .headers()
        .get("x-admin-token")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let authorized: bool = presented
        .as_bytes()
        .ct_eq(state.config.admin_api_token.as_bytes())
        .into();

    if authorized {
        Ok(next.run(req).await)
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// Resolution cache statistics for the admin surface
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.resolver.cache().stats())
}

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Health check routes (at root level for infrastructure monitoring)
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness));

    // Admin-facing domain management, consumed by external admin tooling
    let admin_routes = Router::new()
        .route(
            "/api/v1/tenants/:tenant_id/domains",
            get(domains::list_domains).post(domains::create_domain),
        )
        .route(
            "/api/v1/tenants/:tenant_id/domains/:domain_id",
            delete(domains::delete_domain),
        )
        .route(
            "/api/v1/tenants/:tenant_id/domains/:domain_id/challenge",
            post(domains::reissue_challenge),
        )
        .route(
            "/api/v1/tenants/:tenant_id/domains/:domain_id/verify",
            post(domains::verify_domain),
        )
        .route(
            "/api/v1/tenants/:tenant_id/domains/:domain_id/ssl",
            get(domains::ssl_status),
        )
        .route("/api/v1/cache/stats", get(cache_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ));

    // Tenant-facing routes: every request resolves its tenant first
    let tenant_routes = Router::new()
        .route("/api/v1/context", get(context::current_context))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            tenancy::tenant_context,
        ));

    Router::new()
        .merge(health_routes)
        .merge(admin_routes)
        .merge(tenant_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
