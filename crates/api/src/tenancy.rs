//! Per-request tenant context injection
//!
//! The single point that composes resolution and feature gating into the
//! immutable context downstream handlers consume. Every tenant-facing
//! request passes through `tenant_context` before any business logic; a
//! hostname that resolves to no tenant is rejected here, never defaulted.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use classhq_entitlements::{Capability, FeatureSet};
use classhq_shared::{Domain, DomainKind, PlanTier, TenantId};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::routing::ResolvedTenant;
use crate::state::AppState;

// Headers propagated to downstream handlers
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const TENANT_HOST_HEADER: &str = "x-tenant-host";
pub const TENANT_NAME_HEADER: &str = "x-tenant-name";
pub const TENANT_PLAN_HEADER: &str = "x-tenant-plan";
pub const TENANT_FEATURES_HEADER: &str = "x-tenant-features";
pub const TENANT_PRIMARY_DOMAIN_HEADER: &str = "x-tenant-primary-domain";
pub const TENANT_CUSTOM_DOMAIN_HEADER: &str = "x-tenant-custom-domain";

/// Immutable per-request tenant context.
///
/// Built once per request and inserted by value into the request's
/// extensions; nothing downstream can mutate it or observe another
/// request's context.
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    /// The hostname the request arrived on, normalized
    pub hostname: String,
    pub display_name: String,
    pub plan: PlanTier,
    pub features: FeatureSet,
    pub is_primary_domain: bool,
    pub is_custom_domain: bool,
    /// The domain record that matched, as of resolution time
    pub domain: Domain,
}

impl TenantContext {
    pub fn from_resolution(resolved: &ResolvedTenant) -> Self {
        Self {
            tenant_id: resolved.tenant.id,
            hostname: resolved.domain.hostname.clone(),
            display_name: resolved.tenant.name.clone(),
            plan: resolved.tenant.plan,
            features: FeatureSet::for_plan(resolved.tenant.plan),
            is_primary_domain: resolved.domain.kind == DomainKind::Primary,
            is_custom_domain: resolved.domain.kind == DomainKind::Custom,
            domain: resolved.domain.clone(),
        }
    }

    /// Whether the tenant's plan entitles it to a capability
    pub fn is_enabled(&self, capability: Capability) -> bool {
        self.features.is_enabled(capability)
    }
}

/// Middleware: resolve the Host header and inject the tenant context.
pub async fn tenant_context(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let host = match host_of(&req) {
        Some(host) => host.to_string(),
        None => {
            info!("Request without a Host header rejected");
            return Err(ApiError::TenantNotFound);
        }
    };

    let resolved = state.resolver.resolve(&host).await?;
    let context = TenantContext::from_resolution(&resolved);

    apply_context_headers(req.headers_mut(), &context);
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

fn host_of(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        // HTTP/2 carries the hostname in the :authority pseudo-header
        .or_else(|| req.uri().host())
}

/// Propagate the context as request headers for downstream handlers
pub fn apply_context_headers(headers: &mut HeaderMap, context: &TenantContext) {
    set_header(headers, TENANT_ID_HEADER, &context.tenant_id.to_string());
    set_header(headers, TENANT_HOST_HEADER, &context.hostname);
    set_header(headers, TENANT_NAME_HEADER, &context.display_name);
    set_header(headers, TENANT_PLAN_HEADER, context.plan.as_str());
    set_header(
        headers,
        TENANT_FEATURES_HEADER,
        &context.features.tokens().join(","),
    );
    set_header(
        headers,
        TENANT_PRIMARY_DOMAIN_HEADER,
        bool_str(context.is_primary_domain),
    );
    set_header(
        headers,
        TENANT_CUSTOM_DOMAIN_HEADER,
        bool_str(context.is_custom_domain),
    );
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => {
            // Display names can contain characters headers cannot carry
            warn!(header = name, "Skipping context header with invalid value");
            headers.remove(name);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use classhq_shared::VerificationState;

    use crate::store::MemoryStore;

    fn sample_resolution(name: &str, plan: PlanTier) -> ResolvedTenant {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant(name, "school-a", plan);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );
        ResolvedTenant { tenant, domain }
    }

    #[test]
    fn test_context_from_resolution() {
        let resolved = sample_resolution("School A", PlanTier::Standard);
        let context = TenantContext::from_resolution(&resolved);

        assert_eq!(context.tenant_id, resolved.tenant.id);
        assert_eq!(context.hostname, "a.example.com");
        assert_eq!(context.plan, PlanTier::Standard);
        assert!(!context.is_primary_domain);
        assert!(context.is_custom_domain);

        // Feature gating is derived from the plan, fail closed above it
        assert!(context.is_enabled(Capability::AttendanceTracking));
        assert!(!context.is_enabled(Capability::ApiAccess));
        assert!(!context.is_enabled(Capability::CustomBranding));
    }

    #[test]
    fn test_apply_context_headers() {
        let resolved = sample_resolution("School A", PlanTier::Standard);
        let context = TenantContext::from_resolution(&resolved);

        let mut headers = HeaderMap::new();
        apply_context_headers(&mut headers, &context);

        assert_eq!(
            headers.get(TENANT_ID_HEADER).unwrap().to_str().unwrap(),
            context.tenant_id.to_string()
        );
        assert_eq!(headers.get(TENANT_HOST_HEADER).unwrap(), "a.example.com");
        assert_eq!(headers.get(TENANT_PLAN_HEADER).unwrap(), "standard");
        assert_eq!(headers.get(TENANT_PRIMARY_DOMAIN_HEADER).unwrap(), "false");
        assert_eq!(headers.get(TENANT_CUSTOM_DOMAIN_HEADER).unwrap(), "true");

        let features = headers
            .get(TENANT_FEATURES_HEADER)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(features.contains("attendance_tracking"));
        assert!(!features.contains("api_access"));
    }

    #[tokio::test]
    async fn test_standard_school_scenario() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );

        let resolver = crate::routing::TenantResolver::new(store.clone(), "classhq.com");

        let resolved = resolver.resolve("a.example.com").await.unwrap();
        let context = TenantContext::from_resolution(&resolved);
        assert_eq!(context.display_name, "School A");
        assert_eq!(context.plan, PlanTier::Standard);
        assert!(context.is_enabled(Capability::AttendanceTracking));
        assert!(!context.is_enabled(Capability::CustomBranding));
        // Premium-only capability on a standard plan: denial is a boolean
        // outcome the caller turns into an access-control rejection
        assert!(!context.is_enabled(Capability::ApiAccess));

        // An unclaimed hostname is rejected, never defaulted
        assert!(resolver.resolve("unknown.example.com").await.is_err());
    }

    #[test]
    fn test_invalid_header_value_is_skipped() {
        let resolved = sample_resolution("Ünïcode Schule\n", PlanTier::Free);
        let context = TenantContext::from_resolution(&resolved);

        let mut headers = HeaderMap::new();
        apply_context_headers(&mut headers, &context);

        // The name cannot be carried as a header; everything else is
        assert!(headers.get(TENANT_NAME_HEADER).is_none());
        assert!(headers.get(TENANT_ID_HEADER).is_some());
        assert_eq!(headers.get(TENANT_PLAN_HEADER).unwrap(), "free");
    }
}
