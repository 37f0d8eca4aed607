//! Host resolution directory.
//!
//! # Responsibilities
//! - Merge route tables into the ordered host store
//! - Resolve a request host to its document root
//! - Fall back to a lazily computed default root
//!
//! # Ordering
//! Resolution returns the first matching entry in list order, so the link
//! position chosen on insert decides precedence:
//! - literal patterns are linked at the head, ahead of every wildcard
//! - wildcard patterns are appended at the tail, except that a universal `*`
//!   already at the tail stays last and the new wildcard goes just before it

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::VhostConfig;
use crate::vhost::store::{HostEntry, HostStore};

/// Host patterns must be shorter than this many bytes.
pub const MAX_HOST_LEN: usize = 256;

/// Document roots must be shorter than this many bytes.
pub const MAX_ROOT_LEN: usize = 1024;

/// A route entry refused during reload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteRejection {
    #[error("host pattern of {len} bytes exceeds the {max} byte limit", max = MAX_HOST_LEN)]
    HostTooLong { host: String, len: usize },

    #[error("document root for {host} is {len} bytes, limit is {max}", max = MAX_ROOT_LEN)]
    RootTooLong { host: String, len: usize },
}

/// Outcome of merging one route table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadReport {
    pub inserted: usize,
    pub updated: usize,
    pub rejected: Vec<RouteRejection>,
}

/// Where the default document root comes from.
#[derive(Debug, Clone)]
pub struct DefaultRoot {
    app: Option<PathBuf>,
    working_dir: PathBuf,
    fallback_index: String,
}

impl DefaultRoot {
    pub fn new(app: Option<PathBuf>, working_dir: PathBuf, fallback_index: impl Into<String>) -> Self {
        Self {
            app,
            working_dir,
            fallback_index: fallback_index.into(),
        }
    }

    pub fn from_config(config: &VhostConfig) -> Self {
        let working_dir = config
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(config.app.clone(), working_dir, config.fallback_index.clone())
    }

    fn compute(&self) -> PathBuf {
        match &self.app {
            Some(app) => match std::fs::canonicalize(app) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!(app = %app.display(), error = %e, "Cannot canonicalize app path, using it as given");
                    app.clone()
                }
            },
            None => self.working_dir.join(&self.fallback_index),
        }
    }
}

/// Ordered host pattern → document root directory.
///
/// Cloning shares the cached default root, so reload snapshots built from
/// this directory keep the value computed first.
#[derive(Debug, Clone)]
pub struct HostDirectory {
    store: HostStore,
    default_source: DefaultRoot,
    default_root: Arc<OnceLock<PathBuf>>,
}

impl HostDirectory {
    pub fn new(default_source: DefaultRoot) -> Self {
        Self {
            store: HostStore::new(),
            default_source,
            default_root: Arc::new(OnceLock::new()),
        }
    }

    pub fn from_config(config: &VhostConfig) -> Self {
        Self::new(DefaultRoot::from_config(config))
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Entries in resolution order.
    pub fn entries(&self) -> impl Iterator<Item = &HostEntry> + '_ {
        self.store.iter()
    }

    /// Merge a route table: update roots of known patterns, link new ones.
    ///
    /// Entries absent from `routes` are kept.
    pub fn reload<I, H, R>(&mut self, routes: I) -> ReloadReport
    where
        I: IntoIterator<Item = (H, R)>,
        H: Into<String>,
        R: Into<String>,
    {
        let mut report = ReloadReport::default();

        for (host, root) in routes {
            let host = host.into();
            let root = root.into();

            if host.len() >= MAX_HOST_LEN {
                let rejection = RouteRejection::HostTooLong { len: host.len(), host };
                tracing::warn!(reason = %rejection, "Route rejected");
                report.rejected.push(rejection);
                continue;
            }

            if root.len() >= MAX_ROOT_LEN {
                let rejection = RouteRejection::RootTooLong { len: root.len(), host };
                tracing::warn!(reason = %rejection, "Route rejected");
                report.rejected.push(rejection);
                continue;
            }

            match self.store.position(&host) {
                Some(index) => {
                    if let Some(entry) = self.store.get_mut(index) {
                        entry.set_root(root);
                    }
                    report.updated += 1;
                }
                None => {
                    tracing::debug!(host = %host, root = %root, "Adding vhost");
                    self.link(HostEntry::new(host, root));
                    report.inserted += 1;
                }
            }
        }

        report
    }

    fn link(&mut self, entry: HostEntry) {
        if !entry.is_wildcard() {
            self.store.push_front(entry);
            return;
        }

        let universal_tail = self
            .store
            .tail()
            .filter(|&tail| self.store.get(tail).is_some_and(HostEntry::is_universal));

        match universal_tail {
            Some(tail) => {
                self.store.insert_before(tail, entry);
            }
            None => {
                self.store.push_back(entry);
            }
        }
    }

    /// First entry matching `host`, in list order.
    pub fn find(&self, host: &str, allow_prefix: bool) -> Option<&HostEntry> {
        self.store.iter().find(|entry| entry.matches(host, allow_prefix))
    }

    /// Document root for `host`, falling back to the default root.
    ///
    /// A missing host resolves like the empty host name.
    pub fn resolve(&self, host: Option<&str>) -> &Path {
        match self.find(host.unwrap_or(""), true) {
            Some(entry) => entry.root(),
            None => self.default_root(),
        }
    }

    /// Default root, computed on first use and cached.
    pub fn default_root(&self) -> &Path {
        self.default_root.get_or_init(|| {
            let root = self.default_source.compute();
            tracing::info!(root = %root.display(), "Default document root");
            root
        })
    }
}
