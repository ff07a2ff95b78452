//! ClassHQ background worker
//!
//! Runs the out-of-band side of domain verification: periodic DNS
//! re-checks for pending domains and certificate status refreshes.
//! Resolution caches are process-local, so state changes made here reach
//! API processes through the cache TTL backstop.

mod sweep;

use anyhow::Context;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::EnvFilter;

use classhq_api::certs::CertClient;
use classhq_api::{Config, DomainVerifier, PgDomainStore, ResolutionCache};

struct WorkerContext {
    store: PgDomainStore,
    verifier: DomainVerifier<PgDomainStore>,
    max_attempts: i32,
    batch_size: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let pool = classhq_shared::db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;

    let store = PgDomainStore::new(pool);
    let certs = CertClient::from_config(config.fly_api_token.clone(), config.fly_app_name.clone());
    let verifier = DomainVerifier::new(
        store.clone(),
        config.cname_target.clone(),
        Arc::new(ResolutionCache::new()),
        certs,
    );

    let context = Arc::new(WorkerContext {
        store,
        verifier,
        max_attempts: config.verification_max_attempts,
        batch_size: config.verification_batch_size,
    });

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create scheduler: {e}"))?;

    // Verification re-checks every 5 minutes
    let verification_context = context.clone();
    let verification_job = Job::new_async("0 */5 * * * *", move |_id, _scheduler| {
        let context = verification_context.clone();
        Box::pin(async move {
            sweep::run_verification_sweep(
                &context.verifier,
                &context.store,
                context.max_attempts,
                context.batch_size,
            )
            .await;
        })
    })
    .map_err(|e| anyhow::anyhow!("Invalid verification sweep schedule: {e}"))?;
    scheduler
        .add(verification_job)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to schedule verification sweep: {e}"))?;

    // Certificate status refresh every 15 minutes
    let ssl_context = context.clone();
    let ssl_job = Job::new_async("0 */15 * * * *", move |_id, _scheduler| {
        let context = ssl_context.clone();
        Box::pin(async move {
            sweep::run_ssl_refresh(&context.verifier, &context.store, context.batch_size).await;
        })
    })
    .map_err(|e| anyhow::anyhow!("Invalid SSL refresh schedule: {e}"))?;
    scheduler
        .add(ssl_job)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to schedule SSL refresh: {e}"))?;

    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start scheduler: {e}"))?;

    tracing::info!("ClassHQ worker started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    Ok(())
}
