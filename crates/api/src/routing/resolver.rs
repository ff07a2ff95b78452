//! Hostname-to-tenant resolution
//!
//! The request-time authority for which tenant owns a hostname. Consults
//! the Domain Store through the resolution cache; never writes domain
//! state. Ambiguous or ownerless hostnames fail closed: resolution returns
//! `NotFound` rather than ever picking a tenant the caller did not ask for.

use classhq_shared::{Domain, StoreError, Tenant, TenantId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::cache::{CachedResolution, ResolutionCache};
use crate::store::DomainStore;

/// Reserved subdomains that cannot belong to tenants
pub const RESERVED_SUBDOMAINS: &[&str] = &[
    "api", "www", "admin", "mail", "app", "dashboard", "console", "portal", "docs", "help",
    "support", "status", "blog", "cdn", "static", "assets", "media", "staging", "dev", "test",
    "demo",
];

/// Result of resolving a hostname: the owning tenant and the domain record
/// that matched, snapshotted at resolution time
#[derive(Debug, Clone)]
pub struct ResolvedTenant {
    pub tenant: Tenant,
    pub domain: Domain,
}

/// Errors that can occur during resolution
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    /// No active tenant owns this hostname. Callers must reject the
    /// request, never substitute a default tenant.
    #[error("No tenant owns this hostname")]
    NotFound,

    /// The Domain Store could not be reached. Fatal for the current
    /// request; never cached, so recovery is immediate once the store
    /// returns.
    #[error("Domain store unavailable")]
    StoreUnavailable,
}

/// Tenant resolver with caching
pub struct TenantResolver<S> {
    store: S,
    cache: Arc<ResolutionCache>,
    base_domain: String,
}

impl<S: DomainStore> TenantResolver<S> {
    pub fn new(store: S, base_domain: impl Into<String>) -> Self {
        Self::with_cache(store, base_domain, Arc::new(ResolutionCache::new()))
    }

    pub fn with_cache(
        store: S,
        base_domain: impl Into<String>,
        cache: Arc<ResolutionCache>,
    ) -> Self {
        Self {
            store,
            cache,
            base_domain: base_domain.into(),
        }
    }

    /// Resolve a raw Host header value to its owning tenant.
    ///
    /// Side effects are limited to cache population; settled outcomes
    /// (found / not found) are cached, store outages never are.
    pub async fn resolve(&self, host: &str) -> Result<ResolvedTenant, ResolveError> {
        let hostname = normalize_host(host);
        if hostname.is_empty() {
            debug!("Empty hostname after normalization");
            return Err(ResolveError::NotFound);
        }

        if let Some(cached) = self.cache.get(&hostname) {
            return match cached {
                CachedResolution::Found(resolved) => Ok(resolved),
                CachedResolution::NotFound => Err(ResolveError::NotFound),
            };
        }

        match self.resolve_uncached(&hostname).await {
            Ok(resolved) => {
                self.cache.insert(&hostname, resolved.clone());
                Ok(resolved)
            }
            Err(ResolveError::NotFound) => {
                info!(hostname = %hostname, "Hostname resolved to no tenant");
                self.cache.insert_negative(&hostname);
                Err(ResolveError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_uncached(&self, hostname: &str) -> Result<ResolvedTenant, ResolveError> {
        if let Some(resolved) = self.resolve_exact(hostname).await? {
            return Ok(resolved);
        }

        // Fallback: {subdomain}.{base_domain} resolves through the tenant's
        // registered subdomain to its primary domain
        if let Some(subdomain) = subdomain_of(hostname, &self.base_domain) {
            if RESERVED_SUBDOMAINS.contains(&subdomain) {
                return Err(ResolveError::NotFound);
            }
            if let Some(resolved) = self.resolve_subdomain(hostname, subdomain).await? {
                return Ok(resolved);
            }
        }

        Err(ResolveError::NotFound)
    }

    /// Exact match against domain records
    async fn resolve_exact(&self, hostname: &str) -> Result<Option<ResolvedTenant>, ResolveError> {
        let mut records = self
            .store
            .find_domains_by_hostname(hostname)
            .await
            .map_err(map_store_error)?;

        let domain = match records.len() {
            0 => return Ok(None),
            1 => records.remove(0),
            n => {
                // The uniqueness invariant is violated; picking one of the
                // claimants would hand the hostname to an arbitrary tenant
                error!(
                    hostname = %hostname,
                    claimants = n,
                    "Hostname claimed by multiple domain records, failing closed"
                );
                return Err(ResolveError::NotFound);
            }
        };

        if !domain.routable() {
            debug!(
                hostname = %hostname,
                tenant_id = %domain.tenant_id,
                state = domain.verification.as_str(),
                "Domain record exists but is not routable"
            );
            return Err(ResolveError::NotFound);
        }

        self.attach_tenant(hostname, domain).await.map(Some)
    }

    /// Platform subdomain match against tenant records
    async fn resolve_subdomain(
        &self,
        hostname: &str,
        subdomain: &str,
    ) -> Result<Option<ResolvedTenant>, ResolveError> {
        let tenant = match self
            .store
            .find_tenant_by_subdomain(subdomain)
            .await
            .map_err(map_store_error)?
        {
            Some(tenant) => tenant,
            None => return Ok(None),
        };

        if !tenant.active {
            info!(hostname = %hostname, tenant_id = %tenant.id, "Tenant is inactive");
            return Err(ResolveError::NotFound);
        }

        let domains = self
            .store
            .list_domains_for_tenant(tenant.id)
            .await
            .map_err(map_store_error)?;
        let primary = domains
            .into_iter()
            .find(|d| d.kind == classhq_shared::DomainKind::Primary);

        match primary {
            Some(domain) => Ok(Some(ResolvedTenant { tenant, domain })),
            None => {
                warn!(
                    hostname = %hostname,
                    tenant_id = %tenant.id,
                    "Tenant matched by subdomain but has no primary domain record"
                );
                Err(ResolveError::NotFound)
            }
        }
    }

    async fn attach_tenant(
        &self,
        hostname: &str,
        domain: Domain,
    ) -> Result<ResolvedTenant, ResolveError> {
        let tenant = self
            .store
            .find_tenant_by_id(domain.tenant_id)
            .await
            .map_err(map_store_error)?;

        let tenant = match tenant {
            Some(tenant) => tenant,
            None => {
                warn!(
                    hostname = %hostname,
                    tenant_id = %domain.tenant_id,
                    "Domain record points at a missing tenant"
                );
                return Err(ResolveError::NotFound);
            }
        };

        if !tenant.active {
            info!(hostname = %hostname, tenant_id = %tenant.id, "Tenant is inactive");
            return Err(ResolveError::NotFound);
        }

        Ok(ResolvedTenant { tenant, domain })
    }

    /// Invalidate the cache entry for a hostname (domain mutation hook)
    pub fn invalidate_host(&self, host: &str) {
        self.cache.invalidate(&normalize_host(host));
    }

    /// Invalidate all cached resolutions for a tenant
    pub fn invalidate_tenant(&self, tenant_id: TenantId) {
        self.cache.invalidate_tenant(tenant_id);
    }

    /// The resolution cache, for statistics and maintenance
    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }
}

fn map_store_error(err: StoreError) -> ResolveError {
    match err {
        StoreError::Unavailable(msg) => {
            error!(error = %msg, "Domain store unavailable during resolution");
            ResolveError::StoreUnavailable
        }
        other => {
            warn!(error = %other, "Unexpected store error during resolution");
            ResolveError::NotFound
        }
    }
}

/// Normalize a Host header value: strip any port, lowercase
pub fn normalize_host(host: &str) -> String {
    let host = host.split(':').next().unwrap_or(host);
    host.trim().to_lowercase()
}

/// Extract the subdomain label if `host` is directly under `base`
fn subdomain_of<'a>(host: &'a str, base: &str) -> Option<&'a str> {
    let subdomain = host.strip_suffix(base)?.strip_suffix('.')?;
    // Only single-label subdomains resolve; deeper labels are not issued
    if subdomain.is_empty() || subdomain.contains('.') {
        None
    } else {
        Some(subdomain)
    }
}
