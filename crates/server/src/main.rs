mod admin;
mod bootstrap;
mod health;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use tracing::{info, warn};

use shopbot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use shopbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let router = Router::new()
        .merge(health::router(app.db_pool.clone()))
        .merge(webhook::router(webhook::WebhookState {
            pipeline: Arc::clone(&app.pipeline),
            verify_token: app.config.messenger.verify_token.clone(),
        }))
        .merge(admin::router(admin::AdminState {
            stores: Arc::clone(&app.stores),
            reconciler: Arc::clone(&app.reconciler),
        }));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(event_name = "server_started", bind_address = %address, "listening for webhook events");

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let stopping = Arc::new(tokio::sync::Notify::new());
    let stopping_tx = Arc::clone(&stopping);

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!(event_name = "shutdown_requested", "draining in-flight requests");
        stopping_tx.notify_one();
    });

    tokio::select! {
        result = server => result?,
        _ = async {
            stopping.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(
                event_name = "shutdown_grace_elapsed",
                grace_secs = grace.as_secs(),
                "forcing exit with requests still in flight"
            );
        }
    }

    info!(event_name = "server_stopped", "shutdown complete");
    Ok(())
}
