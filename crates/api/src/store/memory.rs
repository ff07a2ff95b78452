//! In-memory Domain Store
//!
//! Backs unit tests and local development without Postgres. Mirrors the
//! Postgres implementation's conflict and monotonic-transition semantics.

use classhq_shared::{
    Domain, DomainId, DomainKind, SslState, SslStatus, StoreError, Tenant, TenantId,
    TenantSettings, VerificationState,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;

use super::{DomainStore, NewDomain};

#[derive(Default)]
struct Inner {
    tenants: HashMap<TenantId, Tenant>,
    domains: HashMap<DomainId, Domain>,
}

/// Thread-safe in-memory store
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a store outage: all operations return `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Create and register an active tenant; tests attach domains
    /// separately.
    pub fn seed_tenant(&self, name: &str, subdomain: &str, plan: classhq_shared::PlanTier) -> Tenant {
        let tenant = Tenant {
            id: TenantId::new(),
            name: name.to_string(),
            subdomain: subdomain.to_string(),
            plan,
            active: true,
            settings: TenantSettings::default(),
            created_at: OffsetDateTime::now_utc(),
        };
        if let Ok(mut inner) = self.inner.write() {
            inner.tenants.insert(tenant.id, tenant.clone());
        }
        tenant
    }

    /// Register a domain record directly, bypassing uniqueness checks so
    /// tests can construct integrity-violation scenarios.
    pub fn seed_domain(
        &self,
        tenant_id: TenantId,
        hostname: &str,
        kind: DomainKind,
        verification: VerificationState,
    ) -> Domain {
        let now = OffsetDateTime::now_utc();
        let domain = Domain {
            id: DomainId::new(),
            tenant_id,
            hostname: hostname.to_string(),
            kind,
            verification,
            verification_token: String::new(),
            verification_attempts: 0,
            last_verification_at: None,
            verified_at: (verification == VerificationState::Verified).then_some(now),
            ssl: SslState::default(),
            created_at: now,
            updated_at: now,
        };
        if let Ok(mut inner) = self.inner.write() {
            inner.domains.insert(domain.id, domain.clone());
        }
        domain
    }

    /// Flip a tenant's active flag in place.
    pub fn set_tenant_active(&self, id: TenantId, active: bool) {
        if let Ok(mut inner) = self.inner.write() {
            if let Some(tenant) = inner.tenants.get_mut(&id) {
                tenant.active = active;
            }
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl DomainStore for MemoryStore {
    async fn find_domains_by_hostname(&self, hostname: &str) -> Result<Vec<Domain>, StoreError> {
        self.check_available()?;
        let inner = self.read()?;
        Ok(inner
            .domains
            .values()
            .filter(|d| d.hostname == hostname)
            .cloned()
            .collect())
    }

    async fn find_domain_by_id(&self, id: DomainId) -> Result<Option<Domain>, StoreError> {
        self.check_available()?;
        Ok(self.read()?.domains.get(&id).cloned())
    }

    async fn find_tenant_by_id(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        self.check_available()?;
        Ok(self.read()?.tenants.get(&id).cloned())
    }

    async fn find_tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, StoreError> {
        self.check_available()?;
        let inner = self.read()?;
        Ok(inner
            .tenants
            .values()
            .find(|t| t.subdomain == subdomain)
            .cloned())
    }

    async fn list_domains_for_tenant(&self, id: TenantId) -> Result<Vec<Domain>, StoreError> {
        self.check_available()?;
        let inner = self.read()?;
        Ok(inner
            .domains
            .values()
            .filter(|d| d.tenant_id == id)
            .cloned()
            .collect())
    }

    async fn insert_domain(&self, new: NewDomain) -> Result<Domain, StoreError> {
        self.check_available()?;
        let mut inner = self.write()?;

        if inner.domains.values().any(|d| d.hostname == new.hostname) {
            return Err(StoreError::Conflict(
                "This hostname is already registered".to_string(),
            ));
        }
        if new.kind == DomainKind::Primary
            && inner
                .domains
                .values()
                .any(|d| d.tenant_id == new.tenant_id && d.kind == DomainKind::Primary)
        {
            return Err(StoreError::Conflict(
                "Tenant already has a primary domain".to_string(),
            ));
        }

        let now = OffsetDateTime::now_utc();
        let domain = Domain {
            id: DomainId::new(),
            tenant_id: new.tenant_id,
            hostname: new.hostname,
            kind: new.kind,
            verification: VerificationState::Pending,
            verification_token: new.verification_token,
            verification_attempts: 0,
            last_verification_at: None,
            verified_at: None,
            ssl: SslState::default(),
            created_at: now,
            updated_at: now,
        };
        inner.domains.insert(domain.id, domain.clone());
        Ok(domain)
    }

    async fn delete_domain(&self, id: DomainId) -> Result<Domain, StoreError> {
        self.check_available()?;
        self.write()?
            .domains
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))
    }

    async fn set_verification_challenge(
        &self,
        id: DomainId,
        token: &str,
    ) -> Result<Domain, StoreError> {
        self.check_available()?;
        let mut inner = self.write()?;
        let domain = inner
            .domains
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))?;
        domain.verification_token = token.to_string();
        domain.verification = VerificationState::Pending;
        domain.verified_at = None;
        domain.updated_at = OffsetDateTime::now_utc();
        Ok(domain.clone())
    }

    async fn update_domain_verification(
        &self,
        id: DomainId,
        state: VerificationState,
    ) -> Result<Domain, StoreError> {
        self.check_available()?;
        let mut inner = self.write()?;
        let domain = inner
            .domains
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))?;
        let now = OffsetDateTime::now_utc();
        match state {
            VerificationState::Verified => {
                domain.verification = VerificationState::Verified;
                // First writer stamps verified-at; retries leave it be
                if domain.verified_at.is_none() {
                    domain.verified_at = Some(now);
                }
            }
            VerificationState::Failed => {
                if domain.verification != VerificationState::Verified {
                    domain.verification = VerificationState::Failed;
                }
            }
            VerificationState::Pending => {
                domain.verification = VerificationState::Pending;
                domain.verified_at = None;
            }
        }
        domain.updated_at = now;
        Ok(domain.clone())
    }

    async fn record_verification_attempt(&self, id: DomainId) -> Result<(), StoreError> {
        self.check_available()?;
        let mut inner = self.write()?;
        let domain = inner
            .domains
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))?;
        domain.verification_attempts += 1;
        domain.last_verification_at = Some(OffsetDateTime::now_utc());
        Ok(())
    }

    async fn record_ssl_status(&self, id: DomainId, status: SslStatus) -> Result<Domain, StoreError> {
        self.check_available()?;
        let mut inner = self.write()?;
        let domain = inner
            .domains
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Domain {} not found", id)))?;
        let now = OffsetDateTime::now_utc();
        domain.ssl.status = status;
        if status == SslStatus::Active && domain.ssl.provisioned_at.is_none() {
            domain.ssl.provisioned_at = Some(now);
        }
        domain.updated_at = now;
        Ok(domain.clone())
    }

    async fn list_domains_pending_verification(&self, limit: i64) -> Result<Vec<Domain>, StoreError> {
        self.check_available()?;
        let inner = self.read()?;
        let mut pending: Vec<Domain> = inner
            .domains
            .values()
            .filter(|d| d.verification == VerificationState::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|d| d.last_verification_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn list_verified_domains_without_ssl(&self, limit: i64) -> Result<Vec<Domain>, StoreError> {
        self.check_available()?;
        let inner = self.read()?;
        let mut verified: Vec<Domain> = inner
            .domains
            .values()
            .filter(|d| {
                d.verification == VerificationState::Verified && d.ssl.status != SslStatus::Active
            })
            .cloned()
            .collect();
        verified.sort_by_key(|d| d.updated_at);
        verified.truncate(limit.max(0) as usize);
        Ok(verified)
    }
}
