//! Virtual host resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Route source (rhai script / TOML)
//!     → config::routes (evaluate to ordered host → root table)
//!     → directory.rs (merge into ordered store)
//!     → SharedDirectory (publish new snapshot)
//!
//! Incoming request (Host header)
//!     → SharedDirectory::snapshot()
//!     → directory.rs (first match in list order, else default root)
//!     → Return: document root
//! ```
//!
//! # Design Decisions
//! - Readers work on immutable snapshots; reload swaps in a new directory
//! - A failed reload leaves the published snapshot untouched
//! - List order decides precedence, not pattern specificity

pub mod directory;
pub mod store;

pub use directory::{DefaultRoot, HostDirectory, ReloadReport, RouteRejection, MAX_HOST_LEN, MAX_ROOT_LEN};
pub use store::{HostEntry, HostStore, WILDCARD};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::routes::{load_routes, RouteSourceError, RouteTable};
use crate::observability::metrics;

/// Published host directory shared between request handlers and reloaders.
#[derive(Debug, Clone)]
pub struct SharedDirectory {
    current: Arc<ArcSwap<HostDirectory>>,
}

impl SharedDirectory {
    pub fn new(directory: HostDirectory) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(directory)),
        }
    }

    /// Current directory snapshot.
    pub fn snapshot(&self) -> Arc<HostDirectory> {
        self.current.load_full()
    }

    /// Resolve a request host against the current snapshot.
    pub fn resolve_owned(&self, host: Option<&str>) -> PathBuf {
        self.current.load().resolve(host).to_path_buf()
    }

    /// Merge `routes` into a copy of the current directory and publish it.
    pub fn apply(&self, routes: &RouteTable) -> ReloadReport {
        let mut report = ReloadReport::default();
        self.current.rcu(|current| {
            let mut next = HostDirectory::clone(current);
            report = next.reload(routes.iter().cloned());
            next
        });

        metrics::record_route_reload(&report);
        tracing::info!(
            inserted = report.inserted,
            updated = report.updated,
            rejected = report.rejected.len(),
            "Host routes reloaded"
        );
        report
    }

    /// Load a route source and apply it.
    ///
    /// On failure the published directory is left as it was.
    pub fn reload_from(&self, path: &Path) -> Result<ReloadReport, RouteSourceError> {
        match load_routes(path) {
            Ok(routes) => Ok(self.apply(&routes)),
            Err(e) => {
                metrics::record_route_reload_failure();
                tracing::error!(path = %path.display(), error = %e, "Failed to load host routes, keeping current routes");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> SharedDirectory {
        SharedDirectory::new(HostDirectory::new(DefaultRoot::new(
            None,
            PathBuf::from("/srv"),
            "route.rhai",
        )))
    }

    #[test]
    fn test_apply_publishes_new_snapshot() {
        let shared = shared();
        let before = shared.snapshot();

        let report = shared.apply(&vec![("a.com".to_string(), "/a".to_string())]);
        assert_eq!(report.inserted, 1);

        assert!(before.is_empty());
        assert_eq!(shared.resolve_owned(Some("a.com")), PathBuf::from("/a"));
        assert_eq!(shared.resolve_owned(Some("b.com")), PathBuf::from("/srv/route.rhai"));
    }

    #[test]
    fn test_failed_reload_keeps_routes() {
        let shared = shared();
        shared.apply(&vec![("a.com".to_string(), "/a".to_string())]);

        let missing = std::env::temp_dir().join("vhostd-no-such-routes.rhai");
        assert!(shared.reload_from(&missing).is_err());
        assert_eq!(shared.resolve_owned(Some("a.com")), PathBuf::from("/a"));
        assert_eq!(shared.snapshot().len(), 1);
    }
}
