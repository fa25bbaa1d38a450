//! HTTP server for browsing and booking e-waste pickup slots.
//!
//! # Environment Variables
//!
//! - `RECYCLI_CONFIG`: Path to the TOML config (default: `recycli.toml` if present)
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `RUST_LOG`: Log filter (default: info)

mod config;
mod dto;
mod error;
mod handlers;
mod router;
mod state;

use std::future;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use recycli_core::{PickupService, SystemClock};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = Config::load()?;
    let range = config.catalog.range(Local::now().date_naive());
    let registry = config.sources.registry();
    if registry.is_empty() {
        warn!("no slot sources configured, the catalog will be empty");
    }

    info!(from = %range.start, to = %range.end, "loading pickup slots");
    let service = PickupService::bootstrap(&registry, range, Arc::new(SystemClock)).await?;
    info!(
        slots = service.catalog().len(),
        bookings = service.ledger().booking_count(),
        "catalog ready"
    );

    let app = router::create_router(AppState::new(Arc::new(service), range));

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %listener.local_addr()?, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutting down"),
        Err(err) => {
            warn!(error = %err, "failed to listen for shutdown signal");
            future::pending::<()>().await;
        }
    }
}
