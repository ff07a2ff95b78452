//! Background verification and SSL sweeps
//!
//! Verification runs out-of-band so the request path never blocks on DNS.
//! The sweep re-checks pending domains, gives up on ones past the attempt
//! bound (an admin can re-issue the challenge), and refreshes certificate
//! status for verified domains still waiting on SSL.

use classhq_api::store::DomainStore;
use classhq_api::DomainVerifier;
use classhq_shared::VerificationState;
use tracing::{debug, error, info, warn};

/// Re-check pending domain verifications.
pub async fn run_verification_sweep<S: DomainStore>(
    verifier: &DomainVerifier<S>,
    store: &S,
    max_attempts: i32,
    batch_size: i64,
) {
    let pending = match store.list_domains_pending_verification(batch_size).await {
        Ok(domains) => domains,
        Err(err) => {
            error!(error = %err, "Failed to list pending domains");
            return;
        }
    };

    if pending.is_empty() {
        return;
    }

    info!(count = pending.len(), "Re-checking pending domain verifications");

    for domain in pending {
        if domain.verification_attempts >= max_attempts {
            // Stop burning DNS lookups; the domain stays retryable through
            // an admin-issued fresh challenge
            match store
                .update_domain_verification(domain.id, VerificationState::Failed)
                .await
            {
                Ok(_) => info!(
                    tenant_id = %domain.tenant_id,
                    hostname = %domain.hostname,
                    attempts = domain.verification_attempts,
                    "Domain verification marked failed after repeated attempts"
                ),
                Err(err) => warn!(
                    hostname = %domain.hostname,
                    error = %err,
                    "Failed to mark domain verification as failed"
                ),
            }
            continue;
        }

        match verifier.check_verification(domain.id).await {
            Ok(report) if report.success => info!(
                tenant_id = %domain.tenant_id,
                hostname = %domain.hostname,
                "Domain verified by background sweep"
            ),
            Ok(_) => debug!(
                hostname = %domain.hostname,
                attempts = domain.verification_attempts + 1,
                "Domain verification still pending"
            ),
            Err(err) => warn!(
                hostname = %domain.hostname,
                error = %err,
                "Background verification check failed"
            ),
        }
    }
}

/// Refresh certificate status for verified domains without active SSL.
pub async fn run_ssl_refresh<S: DomainStore>(
    verifier: &DomainVerifier<S>,
    store: &S,
    batch_size: i64,
) {
    let domains = match store.list_verified_domains_without_ssl(batch_size).await {
        Ok(domains) => domains,
        Err(err) => {
            error!(error = %err, "Failed to list domains awaiting SSL");
            return;
        }
    };

    for domain in domains {
        match verifier.check_ssl(domain.id).await {
            Ok(ssl) => debug!(
                hostname = %domain.hostname,
                status = ssl.status.as_str(),
                "Refreshed certificate status"
            ),
            Err(err) => warn!(
                hostname = %domain.hostname,
                error = %err,
                "Certificate status refresh failed"
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use classhq_api::store::MemoryStore;
    use classhq_api::ResolutionCache;
    use classhq_shared::{DomainKind, PlanTier, SslStatus};
    use std::sync::Arc;

    fn verifier(store: MemoryStore) -> DomainVerifier<MemoryStore> {
        DomainVerifier::new(store, "edge.classhq.com", Arc::new(ResolutionCache::new()), None)
    }

    #[tokio::test]
    async fn test_sweep_marks_exhausted_domains_failed() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Pending,
        );
        for _ in 0..3 {
            store.record_verification_attempt(domain.id).await.unwrap();
        }

        let verifier = verifier(store.clone());
        run_verification_sweep(&verifier, &store, 3, 10).await;

        let stored = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.verification, VerificationState::Failed);
    }

    #[tokio::test]
    async fn test_sweep_never_touches_verified_domains() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );

        let verifier = verifier(store.clone());
        run_verification_sweep(&verifier, &store, 3, 10).await;

        let stored = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.verification, VerificationState::Verified);
        assert_eq!(stored.verification_attempts, 0);
    }

    #[tokio::test]
    async fn test_ssl_refresh_without_cert_client_is_a_noop() {
        let store = MemoryStore::new();
        let tenant = store.seed_tenant("School A", "school-a", PlanTier::Standard);
        let domain = store.seed_domain(
            tenant.id,
            "a.example.com",
            DomainKind::Custom,
            VerificationState::Verified,
        );

        let verifier = verifier(store.clone());
        run_ssl_refresh(&verifier, &store, 10).await;

        let stored = store.find_domain_by_id(domain.id).await.unwrap().unwrap();
        assert_eq!(stored.ssl.status, SslStatus::Inactive);
    }
}
