//! HTTP transport over the orchestration core.

pub mod error;
pub mod handlers;
pub mod routes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::{log_error, log_info};

pub use error::ApiError;
pub use routes::create_router;

/// Shared handler state
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub staging_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, staging_dir: PathBuf, max_upload_bytes: usize) -> Self {
        Self {
            orchestrator,
            staging_dir,
            max_upload_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Arc::new(config.build_orchestrator()?),
            config.server.staging_dir(),
            config.server.max_upload_bytes,
        ))
    }
}

/// Bind and serve until Ctrl+C or SIGTERM.
pub async fn serve(config: &Config) -> Result<()> {
    let state = Arc::new(AppState::from_config(config)?);
    tokio::fs::create_dir_all(&state.staging_dir)
        .await
        .with_context(|| format!("Failed to create staging dir {}", state.staging_dir.display()))?;

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    log_info!("lessonsmith listening on {}", addr);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    log_info!("lessonsmith stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log_error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log_error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => log_info!("Received Ctrl+C, shutting down"),
        () = terminate => log_info!("Received SIGTERM, shutting down"),
    }
}
