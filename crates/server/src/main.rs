mod adapters;
mod bootstrap;
mod health;
mod receipts;
mod webhooks;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use marmita_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use marmita_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // An explicit path on the command line must exist; otherwise the default locations are optional.
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let options = LoadOptions {
        require_file: config_path.is_some(),
        config_path,
        ..LoadOptions::default()
    };
    let config = AppConfig::load(options)?;
    init_logging(&config);

    let mut app = bootstrap::bootstrap_with_config(config).await?;
    let background = app.start_background();

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind {address}"))?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        transport_mode = app.messenger.mode(),
        "marmita-server listening"
    );

    let drain = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let server = axum::serve(listener, app.router()).with_graceful_shutdown(wait_for_shutdown());
    server.await.context("http server terminated unexpectedly")?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        in_flight = app.in_flight.count(),
        "marmita-server stopping"
    );
    if tokio::time::timeout(drain, app.in_flight.drained()).await.is_err() {
        tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            in_flight = app.in_flight.count(),
            drain_secs = drain.as_secs(),
            "webhook tasks still running after the drain window"
        );
    }
    for task in background {
        task.abort();
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
}
