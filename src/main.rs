//! Stars ledger service entry point.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create the database pool and run migrations
//! 3. Build notifiers and application state
//! 4. Serve the HTTP router on the configured port

use std::sync::Arc;

use stars_ledger::{
    config::Config,
    create_router, db,
    services::notifier::NotifierRegistry,
    state::{AppState, Settings, Stores},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controls verbosity, "info" by default
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    let settings = Settings::from_config(&config)?;
    tracing::info!(prices = settings.prices.len(), "Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let endpoints = config.notify_endpoint_map()?;
    tracing::info!(tenants = endpoints.len(), "Notification endpoints configured");
    let notifier = NotifierRegistry::from_endpoints(
        &endpoints,
        config.notify_secret.clone(),
        config.notify_timeout(),
        config.retry_policy(),
    )?;

    let state = AppState::new(Stores::postgres(pool), Arc::new(notifier), settings);
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
