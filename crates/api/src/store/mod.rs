//! Domain Store collaborator interface
//!
//! The store owns tenant and domain records; everything on the request path
//! only reads it, and the verifier writes through the narrow operations
//! below. `PgDomainStore` is the production implementation; `MemoryStore`
//! backs tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgDomainStore;

use classhq_shared::{
    Domain, DomainId, DomainKind, SslStatus, StoreError, Tenant, TenantId, VerificationState,
};
use std::future::Future;

/// Fields for a new domain record; created in pending state
#[derive(Debug, Clone)]
pub struct NewDomain {
    pub tenant_id: TenantId,
    pub hostname: String,
    pub kind: DomainKind,
    pub verification_token: String,
}

/// Read/write operations on tenant and domain records.
///
/// Hostname arguments are expected normalized (lowercase, no port).
pub trait DomainStore: Send + Sync {
    /// All domain records claiming a hostname. The uniqueness invariant
    /// means at most one row; callers treat more than one as a
    /// data-integrity violation and fail closed.
    fn find_domains_by_hostname(
        &self,
        hostname: &str,
    ) -> impl Future<Output = Result<Vec<Domain>, StoreError>> + Send;

    fn find_domain_by_id(
        &self,
        id: DomainId,
    ) -> impl Future<Output = Result<Option<Domain>, StoreError>> + Send;

    fn find_tenant_by_id(
        &self,
        id: TenantId,
    ) -> impl Future<Output = Result<Option<Tenant>, StoreError>> + Send;

    fn find_tenant_by_subdomain(
        &self,
        subdomain: &str,
    ) -> impl Future<Output = Result<Option<Tenant>, StoreError>> + Send;

    fn list_domains_for_tenant(
        &self,
        id: TenantId,
    ) -> impl Future<Output = Result<Vec<Domain>, StoreError>> + Send;

    /// Insert a new domain record. Fails with `Conflict` when any tenant
    /// already claims the hostname (never silently overwrites).
    fn insert_domain(
        &self,
        new: NewDomain,
    ) -> impl Future<Output = Result<Domain, StoreError>> + Send;

    /// Delete a domain record, returning the deleted row so callers can
    /// invalidate cached resolutions for its hostname.
    fn delete_domain(
        &self,
        id: DomainId,
    ) -> impl Future<Output = Result<Domain, StoreError>> + Send;

    /// Store a fresh verification token and reset the domain to pending.
    fn set_verification_challenge(
        &self,
        id: DomainId,
        token: &str,
    ) -> impl Future<Output = Result<Domain, StoreError>> + Send;

    /// Transition the verification state.
    ///
    /// Writing `Verified` is idempotent and convergent under concurrency:
    /// the first successful transition stamps verified-at, later writes
    /// leave the stamp untouched. Writing `Failed` never downgrades an
    /// already-verified domain.
    fn update_domain_verification(
        &self,
        id: DomainId,
        state: VerificationState,
    ) -> impl Future<Output = Result<Domain, StoreError>> + Send;

    /// Bump the attempt counter and last-checked stamp (bookkeeping only).
    fn record_verification_attempt(
        &self,
        id: DomainId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn record_ssl_status(
        &self,
        id: DomainId,
        status: SslStatus,
    ) -> impl Future<Output = Result<Domain, StoreError>> + Send;

    /// Pending domains due for a background re-check, oldest check first.
    fn list_domains_pending_verification(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Domain>, StoreError>> + Send;

    /// Verified domains whose certificate is not yet active.
    fn list_verified_domains_without_ssl(
        &self,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Domain>, StoreError>> + Send;
}
