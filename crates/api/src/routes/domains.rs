//! Admin-facing custom domain management
//!
//! These routes let external admin tooling attach custom domains
//! (e.g. portal.school-a.org) to a tenant alongside its platform
//! subdomain, drive ownership verification, and inspect SSL status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use classhq_entitlements::{Capability, FeatureSet};
use classhq_shared::{Domain, DomainId, DomainKind, SslState, Tenant, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::ApiError,
    routing::normalize_host,
    state::AppState,
    store::{DomainStore, NewDomain},
    verify::{generate_verification_token, DnsChallenge, VerificationReport},
};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateDomainRequest {
    /// The custom domain (e.g. "portal.school-a.org")
    pub hostname: String,
}

#[derive(Debug, Serialize)]
pub struct CreateDomainResponse {
    pub domain: Domain,
    /// Records to publish before triggering verification
    pub dns_instructions: DnsChallenge,
}

#[derive(Debug, Serialize)]
pub struct ListDomainsResponse {
    pub domains: Vec<Domain>,
}

#[derive(Debug, Serialize)]
pub struct VerifyDomainResponse {
    pub domain: Domain,
    pub verification: VerificationReport,
}

#[derive(Debug, Serialize)]
pub struct SslStatusResponse {
    pub hostname: String,
    pub ssl: SslState,
}

// ============================================================================
// Route handlers
// ============================================================================

/// List all domains attached to a tenant
pub async fn list_domains(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<ListDomainsResponse>, ApiError> {
    let tenant = tenant_or_404(&state, TenantId(tenant_id)).await?;
    let domains = state.store.list_domains_for_tenant(tenant.id).await?;
    Ok(Json(ListDomainsResponse { domains }))
}

/// Attach a new custom domain to a tenant
pub async fn create_domain(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(req): Json<CreateDomainRequest>,
) -> Result<(StatusCode, Json<CreateDomainResponse>), ApiError> {
    let tenant = tenant_or_404(&state, TenantId(tenant_id)).await?;

    // Custom domains are a plan feature
    if !FeatureSet::for_plan(tenant.plan).is_enabled(Capability::CustomDomain) {
        return Err(ApiError::Forbidden);
    }

    let hostname = normalize_host(req.hostname.trim());
    if !is_valid_domain(&hostname) {
        return Err(ApiError::BadRequest(
            "Invalid domain format. Please enter a valid domain like 'portal.yourschool.org'"
                .to_string(),
        ));
    }

    // Hostnames under the platform base domain are issued by the platform,
    // not registered as custom domains
    let base_suffix = format!(".{}", state.config.base_domain);
    if hostname == state.config.base_domain || hostname.ends_with(&base_suffix) {
        return Err(ApiError::BadRequest(format!(
            "Hostnames under {} are platform subdomains and cannot be added as custom domains",
            state.config.base_domain
        )));
    }

    // Uniqueness is enforced by the store: a hostname already claimed by
    // any tenant conflicts instead of being overwritten
    let domain = state
        .store
        .insert_domain(NewDomain {
            tenant_id: tenant.id,
            hostname,
            kind: DomainKind::Custom,
            verification_token: generate_verification_token(),
        })
        .await?;

    // Drop any negative cache entry left from lookups before the add
    state.resolver.invalidate_host(&domain.hostname);

    tracing::info!(
        tenant_id = %tenant.id,
        hostname = %domain.hostname,
        "Custom domain added"
    );

    let dns_instructions = state.verifier.challenge_for(&domain);
    Ok((
        StatusCode::CREATED,
        Json(CreateDomainResponse {
            domain,
            dns_instructions,
        }),
    ))
}

/// Detach a custom domain from a tenant
pub async fn delete_domain(
    State(state): State<AppState>,
    Path((tenant_id, domain_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let domain = domain_owned(&state, TenantId(tenant_id), DomainId(domain_id)).await?;

    if domain.kind == DomainKind::Primary {
        return Err(ApiError::BadRequest(
            "The platform subdomain cannot be deleted".to_string(),
        ));
    }

    let deleted = state.store.delete_domain(domain.id).await?;

    // Invalidate before responding so no later resolution can observe the
    // deleted ownership beyond the bounded TTL
    state.resolver.invalidate_host(&deleted.hostname);

    tracing::info!(
        tenant_id = %deleted.tenant_id,
        hostname = %deleted.hostname,
        "Custom domain deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

/// Re-issue the ownership challenge (fresh token, back to pending)
pub async fn reissue_challenge(
    State(state): State<AppState>,
    Path((tenant_id, domain_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<CreateDomainResponse>, ApiError> {
    let domain = domain_owned(&state, TenantId(tenant_id), DomainId(domain_id)).await?;
    let (domain, dns_instructions) = state.verifier.begin_verification(domain.id).await?;
    Ok(Json(CreateDomainResponse {
        domain,
        dns_instructions,
    }))
}

/// Trigger DNS verification for a domain
pub async fn verify_domain(
    State(state): State<AppState>,
    Path((tenant_id, domain_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VerifyDomainResponse>, ApiError> {
    let domain = domain_owned(&state, TenantId(tenant_id), DomainId(domain_id)).await?;

    let verification = state.verifier.check_verification(domain.id).await?;
    let domain = state
        .store
        .find_domain_by_id(domain.id)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(VerifyDomainResponse {
        domain,
        verification,
    }))
}

/// Query the certificate status for a domain
pub async fn ssl_status(
    State(state): State<AppState>,
    Path((tenant_id, domain_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<SslStatusResponse>, ApiError> {
    let domain = domain_owned(&state, TenantId(tenant_id), DomainId(domain_id)).await?;
    let ssl = state.verifier.check_ssl(domain.id).await?;
    Ok(Json(SslStatusResponse {
        hostname: domain.hostname,
        ssl,
    }))
}

// ============================================================================
// Helper functions
// ============================================================================

async fn tenant_or_404(state: &AppState, tenant_id: TenantId) -> Result<Tenant, ApiError> {
    state
        .store
        .find_tenant_by_id(tenant_id)
        .await?
        .ok_or(ApiError::NotFound)
}

/// Fetch a domain and check it belongs to the tenant in the path
async fn domain_owned(
    state: &AppState,
    tenant_id: TenantId,
    domain_id: DomainId,
) -> Result<Domain, ApiError> {
    let domain = state
        .store
        .find_domain_by_id(domain_id)
        .await?
        .ok_or(ApiError::NotFound)?;

    if domain.tenant_id != tenant_id {
        // Do not leak that the domain exists under another tenant
        return Err(ApiError::NotFound);
    }

    Ok(domain)
}

/// Validate domain format
fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > 253 {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    for part in parts {
        if part.is_empty() || part.len() > 63 {
            return false;
        }
        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }
        if !part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_domain() {
        assert!(is_valid_domain("portal.school-a.org"));
        assert!(is_valid_domain("school-a.org"));
        assert!(is_valid_domain("a.b.c.d.example.com"));

        assert!(!is_valid_domain(""));
        assert!(!is_valid_domain("no-dots"));
        assert!(!is_valid_domain("has space.example.com"));
        assert!(!is_valid_domain("-leading.example.com"));
        assert!(!is_valid_domain("trailing-.example.com"));
        assert!(!is_valid_domain(".empty-label.com"));
        assert!(!is_valid_domain(&format!("{}.com", "a".repeat(64))));
    }
}
