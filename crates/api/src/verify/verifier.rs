//! Domain ownership verification workflow

use classhq_shared::{Domain, DomainId, SslState, SslStatus, StoreError, VerificationState};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dns::{self, DnsCheckOutcome};
use crate::certs::CertClient;
use crate::routing::ResolutionCache;
use crate::store::DomainStore;

/// A DNS record an admin must publish
#[derive(Debug, Clone, Serialize)]
pub struct DnsRecordSpec {
    pub record_type: String,
    pub name: String,
    pub value: String,
    pub ttl: u32,
}

/// The records to publish to prove ownership of a domain
#[derive(Debug, Clone, Serialize)]
pub struct DnsChallenge {
    pub cname: DnsRecordSpec,
    pub txt: DnsRecordSpec,
}

/// Outcome of a verification check, with a human-readable reason
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub success: bool,
    pub state: VerificationState,
    pub cname_valid: bool,
    pub txt_valid: bool,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("Domain not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Verifies custom domain ownership and tracks certificate status.
///
/// Runs out-of-band relative to request resolution; its only interaction
/// with the hot path is invalidating cache entries after a state change.
pub struct DomainVerifier<S> {
    store: S,
    cache: Arc<ResolutionCache>,
    cname_target: String,
    certs: Option<CertClient>,
}

impl<S: DomainStore> DomainVerifier<S> {
    pub fn new(
        store: S,
        cname_target: impl Into<String>,
        cache: Arc<ResolutionCache>,
        certs: Option<CertClient>,
    ) -> Self {
        Self {
            store,
            cache,
            cname_target: cname_target.into(),
            certs,
        }
    }

    /// The DNS records an admin must publish for a domain
    pub fn challenge_for(&self, domain: &Domain) -> DnsChallenge {
        DnsChallenge {
            cname: DnsRecordSpec {
                record_type: "CNAME".to_string(),
                name: domain.hostname.clone(),
                value: self.cname_target.clone(),
                ttl: 3600,
            },
            txt: DnsRecordSpec {
                record_type: "TXT".to_string(),
                name: dns::txt_record_name(&domain.hostname),
                value: dns::txt_record_value(&domain.verification_token),
                ttl: 3600,
            },
        }
    }

    /// Issue a fresh ownership challenge and reset the domain to pending.
    pub async fn begin_verification(
        &self,
        domain_id: DomainId,
    ) -> Result<(Domain, DnsChallenge), VerifyError> {
        let token = generate_verification_token();
        let domain = match self.store.set_verification_challenge(domain_id, &token).await {
            Ok(domain) => domain,
            Err(StoreError::NotFound(_)) => return Err(VerifyError::NotFound),
            Err(err) => return Err(err.into()),
        };

        // Re-issuing on a previously verified domain un-routes it until the
        // new challenge passes
        self.cache.invalidate(&domain.hostname);

        info!(
            domain_id = %domain.id,
            tenant_id = %domain.tenant_id,
            hostname = %domain.hostname,
            "Issued domain verification challenge"
        );

        let challenge = self.challenge_for(&domain);
        Ok((domain, challenge))
    }

    /// Re-check a domain's ownership challenge against live DNS.
    ///
    /// Idempotent: an already-verified domain reports success without any
    /// writes or DNS traffic. A failed probe leaves the verification state
    /// unchanged so the caller can retry; the domain is never deleted here.
    pub async fn check_verification(
        &self,
        domain_id: DomainId,
    ) -> Result<VerificationReport, VerifyError> {
        let domain = self
            .store
            .find_domain_by_id(domain_id)
            .await?
            .ok_or(VerifyError::NotFound)?;

        if domain.verification == VerificationState::Verified {
            return Ok(VerificationReport {
                success: true,
                state: VerificationState::Verified,
                cname_valid: true,
                txt_valid: true,
                message: "Domain ownership is already verified".to_string(),
            });
        }

        let outcome = dns::probe_challenge(
            &domain.hostname,
            &self.cname_target,
            &domain.verification_token,
        )
        .await;

        self.settle(domain, outcome).await
    }

    /// Apply a probe outcome to a domain's verification state.
    ///
    /// The pending -> verified transition is a single conditional store
    /// write; concurrent successful checks converge on the same verified
    /// row without duplicate side effects.
    pub(crate) async fn settle(
        &self,
        domain: Domain,
        outcome: DnsCheckOutcome,
    ) -> Result<VerificationReport, VerifyError> {
        self.store.record_verification_attempt(domain.id).await?;

        if outcome.passed() {
            let updated = self
                .store
                .update_domain_verification(domain.id, VerificationState::Verified)
                .await?;
            self.cache.invalidate(&updated.hostname);

            info!(
                domain_id = %updated.id,
                tenant_id = %updated.tenant_id,
                hostname = %updated.hostname,
                "Domain ownership verified"
            );

            self.provision_ssl(&updated).await;

            return Ok(VerificationReport {
                success: true,
                state: VerificationState::Verified,
                cname_valid: true,
                txt_valid: true,
                message: "Domain ownership verified".to_string(),
            });
        }

        let mut issues = Vec::new();
        if !outcome.cname_valid {
            issues.push(format!(
                "CNAME record not found or incorrect. Expected {} -> {}",
                domain.hostname, self.cname_target
            ));
        }
        if !outcome.txt_valid {
            issues.push(format!(
                "TXT record not found. Expected {} with value {}",
                dns::txt_record_name(&domain.hostname),
                dns::txt_record_value(&domain.verification_token)
            ));
        }

        info!(
            domain_id = %domain.id,
            tenant_id = %domain.tenant_id,
            hostname = %domain.hostname,
            "Domain verification check did not pass"
        );

        Ok(VerificationReport {
            success: false,
            state: domain.verification,
            cname_valid: outcome.cname_valid,
            txt_valid: outcome.txt_valid,
            message: issues.join(". "),
        })
    }

    /// Report whether a certificate is actively serving the domain.
    ///
    /// Advisory data: a domain can be verified (ownership proven) while SSL
    /// is still provisioning, and certificate state never gates routing.
    pub async fn check_ssl(&self, domain_id: DomainId) -> Result<SslState, VerifyError> {
        let domain = self
            .store
            .find_domain_by_id(domain_id)
            .await?
            .ok_or(VerifyError::NotFound)?;

        let client = match &self.certs {
            Some(client) => client,
            None => {
                debug!(hostname = %domain.hostname, "Certificate API not configured, returning stored SSL state");
                return Ok(domain.ssl);
            }
        };

        match client.check_certificate(&domain.hostname).await {
            Ok(status) => {
                let ssl_status = if status.ready {
                    SslStatus::Active
                } else if status.configured {
                    SslStatus::Provisioning
                } else {
                    SslStatus::Inactive
                };
                let updated = self.store.record_ssl_status(domain.id, ssl_status).await?;
                Ok(updated.ssl)
            }
            Err(err) => {
                warn!(
                    hostname = %domain.hostname,
                    error = %err,
                    "Certificate status check failed, returning stored SSL state"
                );
                Ok(domain.ssl)
            }
        }
    }

    /// Best-effort certificate provisioning after a successful verification
    async fn provision_ssl(&self, domain: &Domain) {
        let client = match &self.certs {
            Some(client) => client,
            None => {
                debug!(hostname = %domain.hostname, "Certificate API not configured, skipping SSL provisioning");
                return;
            }
        };

        match client.add_certificate(&domain.hostname).await {
            Ok(()) => {
                if let Err(err) = self
                    .store
                    .record_ssl_status(domain.id, SslStatus::Provisioning)
                    .await
                {
                    warn!(hostname = %domain.hostname, error = %err, "Failed to record SSL provisioning state");
                }
            }
            Err(err) => {
                // Ownership stands; SSL can be retried from the worker sweep
                warn!(hostname = %domain.hostname, error = %err, "SSL provisioning failed");
            }
        }
    }
}

/// Generate a verification token (32 lowercase alphanumeric characters)
pub fn generate_verification_token() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..36);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use classhq_shared::{DomainKind, PlanTier};

    use crate::routing::ResolvedTenant;
    use crate::store::MemoryStore;

    const CNAME_TARGET: &str = "edge.classhq.com";

    fn verifier(store: MemoryStore, cache: Arc<ResolutionCache>) -> DomainVerifier<MemoryStore> {
        DomainVerifier::new(store, CNAME_TARGET, cache, None)
    }

    #[test]
    fn test_generate_verification_token() {
        let token = generate_verification_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(token, generate_verification_token());
    }

    #[tokio::test]
    async fn test_check_verification_is_idempotent_once_verified() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );
        let verified_at = domain.verified_at;

        let verifier = verifier(store.clone(), Arc::new(ResolutionCache::new()));

        // Two checks on an already-verified domain: both succeed, nothing
        // is re-probed or rewritten
        let first = verifier.check_verification(domain.id).await.unwrap();
        let second = verifier.check_verification(domain.id).await.unwrap();
        assert!(first.success);
        assert!(second.success);

        let stored = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.verification, VerificationState::Verified);
        assert_eq!(stored.verified_at, verified_at);
        assert_eq!(stored.verification_attempts, 0);
    }

    #[tokio::test]
    async fn test_settle_success_transitions_and_invalidates() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Pending,
        );

        let cache = Arc::new(ResolutionCache::new());
        // A (stale) negative entry is present from before verification
        cache.insert_negative("a.example.com");

        let verifier = verifier(store.clone(), cache.clone());
        let report = verifier
            .settle(
                domain.clone(),
                DnsCheckOutcome {
                    cname_valid: true,
                    txt_valid: true,
                },
            )
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.state, VerificationState::Verified);

        let stored = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.verification, VerificationState::Verified);
        assert!(stored.verified_at.is_some());
        assert_eq!(stored.verification_attempts, 1);

        // The hostname's cache entry was invalidated before returning
        assert!(cache.get("a.example.com").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_successes_converge() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Pending,
        );

        let verifier = verifier(store.clone(), Arc::new(ResolutionCache::new()));
        let outcome = DnsCheckOutcome {
            cname_valid: true,
            txt_valid: true,
        };

        // Two in-flight retries both observe success
        let first = verifier.settle(domain.clone(), outcome).await.unwrap();
        let after_first = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        let second = verifier.settle(domain.clone(), outcome).await.unwrap();
        let after_second = store.find_domain_by_id(domain.id).await.unwrap().unwrap();

        assert!(first.success);
        assert!(second.success);
        // The first writer's stamp survives; the second is a no-op
        assert_eq!(after_first.verified_at, after_second.verified_at);
        assert_eq!(after_second.verification, VerificationState::Verified);
    }

    #[tokio::test]
    async fn test_settle_failure_leaves_state_unchanged() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Pending,
        );

        let verifier = verifier(store.clone(), Arc::new(ResolutionCache::new()));
        let report = verifier
            .settle(
                domain.clone(),
                DnsCheckOutcome {
                    cname_valid: true,
                    txt_valid: false,
                },
            )
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.state, VerificationState::Pending);
        assert!(report.message.contains("TXT record not found"));

        // Still pending and still present: failure never deletes a domain
        let stored = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.verification, VerificationState::Pending);
        assert_eq!(stored.verification_attempts, 1);
    }

    #[tokio::test]
    async fn test_begin_verification_issues_challenge_and_unroutes() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );

        let cache = Arc::new(ResolutionCache::new());
        cache.insert(
            "a.example.com",
            ResolvedTenant {
                tenant: tenant.clone(),
                domain: domain.clone(),
            },
        );

        let verifier = verifier(store.clone(), cache.clone());
        let (updated, challenge) = verifier.begin_verification(domain.id).await.unwrap();

        assert_eq!(updated.verification, VerificationState::Pending);
        assert!(updated.verified_at.is_none());
        assert_eq!(updated.verification_token.len(), 32);

        assert_eq!(challenge.cname.value, CNAME_TARGET);
        assert_eq!(
            challenge.txt.name,
            "_classhq-verification.a.example.com"
        );
        assert_eq!(
            challenge.txt.value,
            format!("classhq-verify={}", updated.verification_token)
        );

        // The stale resolution was dropped along with the verified state
        assert!(cache.get("a.example.com").is_none());
    }

    #[tokio::test]
    async fn test_check_ssl_without_cert_client_returns_stored_state() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );

        let verifier = verifier(store.clone(), Arc::new(ResolutionCache::new()));
        let ssl = verifier.check_ssl(domain.id).await.unwrap();
        assert_eq!(ssl.status, SslStatus::Inactive);
    }

    #[tokio::test]
    async fn test_verify_missing_domain_is_not_found() {
        let store = MemoryStore::new();
        let verifier = verifier(store, Arc::new(ResolutionCache::new()));
        let result = verifier.check_verification(DomainId::new()).await;
        assert!(matches!(result, Err(VerifyError::NotFound)));
    }
}
