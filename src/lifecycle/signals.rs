//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT / SIGTERM and turn them into a shutdown trigger
//! - Reload host routes on SIGHUP
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers a route reload, not shutdown
//! - A handler that cannot be installed is logged; the server keeps running

use std::path::{Path, PathBuf};

use tokio::sync::broadcast;

use crate::lifecycle::Shutdown;
use crate::vhost::{ReloadReport, SharedDirectory};

/// Resolve once SIGINT or (on unix) SIGTERM arrives.
pub async fn wait_for_termination() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("SIGINT received"),
        _ = terminate => tracing::info!("SIGTERM received"),
    }
}

/// Trigger `shutdown` on the first termination signal.
pub fn spawn_termination_handler(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        wait_for_termination().await;
        let notified = shutdown.trigger();
        tracing::info!(tasks = notified, "Graceful shutdown started");
    })
}

/// Reload routes from `path`, logging each rejected route.
///
/// Returns `None` when the source could not be loaded; the directory logs
/// and counts that failure and keeps its current routes.
pub fn reload_routes(directory: &SharedDirectory, path: &Path) -> Option<ReloadReport> {
    let report = directory.reload_from(path).ok()?;
    for rejection in &report.rejected {
        tracing::warn!(error = %rejection, "Host route rejected");
    }
    if !report.rejected.is_empty() {
        tracing::warn!(
            path = %path.display(),
            rejected = report.rejected.len(),
            "Host routes reloaded with rejections"
        );
    }
    Some(report)
}

/// Reload routes from `path` on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    directory: SharedDirectory,
    path: PathBuf,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGHUP handler");
                return;
            }
        };

        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!(path = %path.display(), "SIGHUP received, reloading host routes");
                    if let Some(report) = reload_routes(&directory, &path) {
                        tracing::debug!(inserted = report.inserted, updated = report.updated, "SIGHUP reload applied");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(
    _directory: SharedDirectory,
    _path: PathBuf,
    _shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async {})
}
