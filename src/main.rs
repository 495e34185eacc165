//! studyd - study productivity daemon
//!
//! A REST backend for flashcards with SM-2 spaced-repetition scheduling,
//! notes, practice quizzes, chunked study-material uploads and per-subject
//! progress tracking.

mod api;
mod config;
mod db;
mod error;
mod metrics;
mod security;
mod state;
mod uploads;

use crate::config::Config;
use crate::db::Database;
use crate::state::AppState;
use std::net::SocketAddr;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        listen = %config.listen.address,
        "Starting studyd"
    );

    // Initialize database
    let db = Database::new(&config.database.path).await?;

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        tokio::spawn(async move {
            metrics::run_metrics_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let listen = config.listen.address;
    let upload_ttl = config.storage.upload_ttl_secs;
    let state = AppState::new(config, db.clone())?;

    // Expired-session sweep (runs hourly, refreshes the live-session gauge)
    {
        let db = db.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match db.sessions().delete_expired().await {
                    Ok(removed) if removed > 0 => {
                        info!(removed = removed, "Expired sessions removed");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to sweep expired sessions");
                    }
                }
                match db.sessions().count_active().await {
                    Ok(count) => metrics::set_active_sessions(count),
                    Err(e) => tracing::warn!(error = %e, "Failed to count active sessions"),
                }
            }
        });
    }
    info!("Session sweep task started");

    // Stale upload reaper (runs every 5 minutes)
    {
        let db = db.clone();
        let store = state.uploads.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                let cutoff = chrono::Utc::now().timestamp() - upload_ttl as i64;
                let stale = match db.uploads().stale_ids(cutoff).await {
                    Ok(ids) => ids,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to list stale uploads");
                        continue;
                    }
                };
                for id in stale {
                    if let Err(e) = db.uploads().delete(&id).await {
                        tracing::warn!(upload = %id, error = %e, "Failed to delete stale upload");
                        continue;
                    }
                    store.remove_staging(&id).await;
                    metrics::inc(&metrics::UPLOADS_ABORTED);
                    info!(upload = %id, "Stale upload session reaped");
                }
            }
        });
    }
    info!("Upload reaper task started");

    // Rate limiter pruning (runs every 5 minutes, the keyed maps grow unbounded)
    {
        let limiter = state.limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }
    info!("Rate limiter pruning task started");

    // Serve the REST API
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(address = %listen, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
