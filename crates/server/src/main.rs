//! lendboard web server entry point.
//!
//! Boots the axum UI, and when API credentials are configured, acquires a
//! token and starts the background cache sync loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use lendboard_client::{ApiClient, CacheSynchronizer};
use lendboard_core::config::LOG_JSON_ENV;
use lendboard_core::{AppConfig, Store};
use tracing_subscriber::EnvFilter;

mod error;
mod forms;
mod routes;
mod state;
mod templates;

use state::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    if std::env::var_os(LOG_JSON_ENV).is_some() {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let store = Store::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    let sync = if config.has_credentials() {
        let client = ApiClient::from_app_config(&config).context("building API client")?;
        if let Err(e) = client.tokens().acquire().await {
            tracing::warn!(error = %e, "initial authentication failed, the sync loop will retry");
        }
        Some(Arc::new(CacheSynchronizer::new(Arc::new(client), store.clone())))
    } else {
        tracing::warn!("API credentials not configured, background sync disabled");
        None
    };

    let sync_task = sync
        .clone()
        .map(|sync| sync.spawn(config.sync_interval(), config.sync_on_startup));

    let app = routes::router(AppState::new(store, sync));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;

    tracing::info!(addr = %config.bind_addr, "lendboard web UI listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(task) = sync_task {
        task.abort();
    }

    Ok(())
}
