//! Route source watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Watcher, RecursiveMode, Event, RecommendedWatcher, Config};
use tokio::sync::mpsc;
use crate::config::routes::{load_routes, RouteTable};
use crate::observability::metrics;

/// A watcher that monitors the route source for changes.
pub struct RouteWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouteTable>,
}

impl RouteWatcher {
    /// Create a new RouteWatcher.
    ///
    /// Returns the watcher and a receiver for freshly loaded route tables.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouteTable>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (Self {
            path: path.to_path_buf(),
            update_tx,
        }, update_rx)
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for events to keep flowing.
    /// Once the receiving side is gone, change events are ignored.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        forward(&path, &tx);
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            }
        }, Config::default().with_poll_interval(Duration::from_secs(2)))?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Route watcher started");
        Ok(watcher)
    }
}

/// Load the route source and hand it to the server.
///
/// Returns false once nobody consumes route updates.
fn forward(path: &Path, tx: &mpsc::UnboundedSender<RouteTable>) -> bool {
    if tx.is_closed() {
        return false;
    }

    tracing::info!(path = %path.display(), "Route source change detected, reloading...");
    match load_routes(path) {
        Ok(routes) => {
            if tx.send(routes).is_err() {
                tracing::debug!(path = %path.display(), "Route updates no longer consumed, stopping");
                return false;
            }
            true
        }
        Err(e) => {
            metrics::record_route_reload_failure();
            tracing::error!("Failed to reload routes: {}. Keeping current routes.", e);
            true
        }
    }
}
