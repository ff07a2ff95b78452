//! ClassHQ API server entry point

use anyhow::Context;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use classhq_api::{routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    let bind_address = config.bind_address.clone();

    let pool = classhq_shared::db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    classhq_shared::db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let state = AppState::new(config, pool);

    // Periodic cache maintenance; TTL handles correctness, this handles memory
    {
        let resolver = state.resolver.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                resolver.cache().purge_expired();
            }
        });
    }

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    tracing::info!(address = %bind_address, "ClassHQ API listening");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
