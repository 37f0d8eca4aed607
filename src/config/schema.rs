//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Deferred wake scheduler settings.
    pub scheduler: SchedulerConfig,

    /// Virtual host routing.
    pub vhost: VhostConfig,

    /// Request script execution.
    pub script: ScriptConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Wake scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Milliseconds per scheduler tick.
    pub resolution_ms: u64,

    /// Number of wake buckets.
    pub bucket_count: usize,

    /// Sleeps longer than this are indefinite.
    pub max_sleep_ms: u64,

    /// Maximum number of pending timed sleeps.
    pub max_pending: usize,

    /// How often the event loop advances the scheduler. Must not exceed
    /// `resolution_ms`.
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            resolution_ms: 10,
            bucket_count: 640,
            max_sleep_ms: 1_000_000,
            max_pending: 100_000,
            tick_interval_ms: 10,
        }
    }
}

/// Virtual host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VhostConfig {
    /// Route source (rhai script or TOML table).
    pub routes_path: Option<PathBuf>,

    /// Application path used as the default document root.
    pub app: Option<PathBuf>,

    /// Base directory for the fallback index. Defaults to the process cwd.
    pub working_dir: Option<PathBuf>,

    /// File name of the default root when no `app` is set.
    pub fallback_index: String,

    /// Reload routes when the route source changes.
    pub watch: bool,
}

impl Default for VhostConfig {
    fn default() -> Self {
        Self {
            routes_path: None,
            app: None,
            working_dir: None,
            fallback_index: "route.rhai".to_string(),
            watch: true,
        }
    }
}

/// Request script configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Script run for a request when the document root is a directory.
    pub index_file: String,

    /// Operation budget per script run (0 = unlimited).
    pub max_operations: u64,

    /// Scripts allowed to run at once. Each one holds a blocking thread,
    /// sleeping included; requests beyond this get 503.
    pub max_concurrent: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            index_file: "index.rhai".to_string(),
            max_operations: 1_000_000,
            max_concurrent: 256,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time a script may run before `check_timeout()` fails it.
    pub process_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            process_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
