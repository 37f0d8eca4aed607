//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the host directory and load the initial routes
//! - Start the wake loop, route watcher and signal handlers
//! - Serve HTTP until shutdown, then stop the background tasks
//!
//! # Design Decisions
//! - Fail fast: an unreadable initial route source is fatal
//! - Later reload failures are not; the previous routes stay in effect
//! - Listeners start last (traffic only when ready)

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::routes::RouteSourceError;
use crate::config::watcher::RouteWatcher;
use crate::config::ServerConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::runtime::{SleepClient, WakeLoop};
use crate::scheduler::MonotonicClock;
use crate::vhost::{HostDirectory, SharedDirectory};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("cannot load host routes: {0}")]
    Routes(#[from] RouteSourceError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A fully wired server that has not started serving yet.
pub struct Server {
    config: ServerConfig,
    directory: SharedDirectory,
    wake_loop: WakeLoop,
    sleeper: SleepClient,
    shutdown: Shutdown,
}

impl Server {
    /// Build every subsystem from `config`.
    pub fn build(config: ServerConfig) -> Result<Self, StartupError> {
        let directory = SharedDirectory::new(HostDirectory::from_config(&config.vhost));
        if let Some(path) = &config.vhost.routes_path {
            let report = directory.reload_from(path)?;
            for rejection in &report.rejected {
                tracing::warn!(error = %rejection, "Host route rejected");
            }
            if !report.rejected.is_empty() {
                tracing::warn!(rejected = report.rejected.len(), "Some host routes were rejected");
            }
        }
        tracing::info!(
            hosts = directory.snapshot().len(),
            default_root = %directory.snapshot().default_root().display(),
            "Host directory ready"
        );

        let (wake_loop, sleeper) = WakeLoop::new(&config.scheduler, Arc::new(MonotonicClock::new()));

        Ok(Self {
            config,
            directory,
            wake_loop,
            sleeper,
            shutdown: Shutdown::new(),
        })
    }

    pub fn directory(&self) -> &SharedDirectory {
        &self.directory
    }

    pub fn sleeper(&self) -> SleepClient {
        self.sleeper.clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, StartupError> {
        let address = self.config.listener.bind_address.clone();
        TcpListener::bind(&address)
            .await
            .map_err(|source| StartupError::Bind { address, source })
    }

    /// Serve on `listener` until a termination signal or `shutdown()` fires.
    pub async fn run(self, listener: TcpListener) -> Result<(), StartupError> {
        let Server {
            config,
            directory,
            wake_loop,
            sleeper,
            shutdown,
        } = self;

        let wake_task = tokio::spawn(wake_loop.run(shutdown.subscribe()));
        let signal_task = signals::spawn_termination_handler(shutdown.clone());

        let routes_path: Option<PathBuf> = config.vhost.routes_path.clone();
        let (route_updates, _watcher) = match &routes_path {
            Some(path) if config.vhost.watch => {
                let (watcher, updates) = RouteWatcher::new(path);
                match watcher.run() {
                    Ok(watcher) => (updates, Some(watcher)),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Route watcher unavailable, hot reload disabled");
                        (updates, None)
                    }
                }
            }
            _ => (mpsc::unbounded_channel().1, None),
        };
        let hangup_task = routes_path
            .map(|path| signals::spawn_reload_on_hangup(directory.clone(), path, shutdown.subscribe()));

        let server = HttpServer::new(config, directory, sleeper);
        let served = server.run(listener, route_updates, shutdown.subscribe()).await;

        // The HTTP server may also stop on its own; make sure the rest follows.
        shutdown.trigger();
        signal_task.abort();
        if let Some(task) = hangup_task {
            let _ = task.await;
        }
        if let Err(e) = wake_task.await {
            tracing::error!(error = %e, "Wake loop task failed");
        }

        served.map_err(StartupError::from)
    }
}
