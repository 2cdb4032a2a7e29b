use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use domain::services::{ReleaseContext, ReleaseGate, SystemClock};
use parting_gift_api::{
    app, config,
    jobs::ReleaseSupervisor,
    middleware,
    services::{EmailService, GiftDeliveryService},
};
use persistence::repositories::{GiftRepository, UserRepository};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = config::Config::load()?;

    middleware::logging::init_logging(&config.logging)?;
    middleware::init_metrics()?;

    info!("Starting Parting Gift API v{}", env!("CARGO_PKG_VERSION"));

    let db_config: persistence::db::DatabaseConfig = (&config.database).into();
    let pool = persistence::db::create_pool(&db_config).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let email = EmailService::new(config.email.clone())?;
    info!(
        provider = %email.provider(),
        enabled = email.is_enabled(),
        "Email notifier configured"
    );
    if !email.is_enabled() {
        warn!("Email disabled: releases will fail and gifts stay pending until a provider is enabled");
    }

    let supervisor = ReleaseSupervisor::new(ReleaseContext {
        store: Arc::new(GiftRepository::new(pool.clone())),
        owners: Arc::new(UserRepository::new(pool.clone())),
        notifier: Arc::new(email),
        clock: Arc::new(SystemClock),
        timing: config.release.timing(),
        gate: ReleaseGate::new(),
    });

    if config.release.resume_on_startup {
        if let Err(e) = supervisor.resume_pending().await {
            error!(error = %e, "Failed to resume pending releases");
        }
    } else {
        warn!("Resume on startup disabled, armed gifts wait for reconfiguration");
    }

    let delivery = GiftDeliveryService::new(supervisor.clone());
    let shutdown_timeout = Duration::from_secs(config.release.shutdown_timeout_secs);
    let addr = config.socket_addr();
    let app = app::create_app(config, pool, delivery);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown();
    supervisor.wait_for_shutdown(shutdown_timeout).await;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
