//! Tenant context debug endpoint

use axum::{Extension, Json};

use crate::tenancy::TenantContext;

/// Echo the context injected for this request. Lets operators and
/// downstream teams inspect exactly what a hostname resolves to.
pub async fn current_context(Extension(context): Extension<TenantContext>) -> Json<TenantContext> {
    Json(context)
}
