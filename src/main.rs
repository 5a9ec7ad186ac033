use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use seriesmanager_api::{
    config::Config,
    db::{create_pool, run_migrations, PgStore},
    middleware::auth::JwtVerifier,
    routes::{cors_layer, create_router, AppState},
    services::{
        catalog::{BetaSeriesCatalog, SeasonCatalog},
        ReconcileOptions,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("seriesmanager_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    run_migrations(&pool)
        .await
        .context("Failed to apply migrations")?;
    let store = Arc::new(PgStore::new(pool));

    let catalog = BetaSeriesCatalog::new(
        config.catalog_api_key.clone(),
        config.catalog_api_url.clone(),
        config.catalog_timeout(),
    )?;
    tracing::info!(
        catalog = catalog.name(),
        timeout_secs = config.catalog_timeout_secs,
        concurrency = config.catalog_concurrency,
        "Season catalog configured"
    );

    let state = AppState::new(
        store.clone(),
        store,
        Arc::new(catalog),
        ReconcileOptions::from(&config),
        JwtVerifier::new(&config.jwt_secret),
    );

    let app = create_router(state).layer(cors_layer(&config.cors_allow_origin));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    tracing::info!(address = %address, "Server running");

    axum::serve(listener, app).await?;
    Ok(())
}
