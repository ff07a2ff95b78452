//! Shared application state

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::certs::CertClient;
use crate::config::Config;
use crate::routing::{ResolutionCache, TenantResolver};
use crate::store::PgDomainStore;
use crate::verify::DomainVerifier;

/// Application state shared across request handlers.
///
/// The resolver and verifier share one resolution cache so verification
/// state changes invalidate exactly the entries the hot path reads.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub store: PgDomainStore,
    pub resolver: Arc<TenantResolver<PgDomainStore>>,
    pub verifier: Arc<DomainVerifier<PgDomainStore>>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let store = PgDomainStore::new(pool.clone());
        let cache = Arc::new(ResolutionCache::with_ttl(
            Duration::from_secs(config.cache_ttl_secs),
            Duration::from_secs(config.negative_cache_ttl_secs),
        ));

        let resolver = Arc::new(TenantResolver::with_cache(
            store.clone(),
            config.base_domain.clone(),
            cache.clone(),
        ));

        let certs = CertClient::from_config(
            config.fly_api_token.clone(),
            config.fly_app_name.clone(),
        );
        let verifier = Arc::new(DomainVerifier::new(
            store.clone(),
            config.cname_target.clone(),
            cache,
            certs,
        ));

        Self {
            config: Arc::new(config),
            pool,
            store,
            resolver,
            verifier,
        }
    }
}
