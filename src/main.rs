//! vhostd: virtual host script server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ vhost directory ──▶ script runner
//!                     (axum)          (Host → root)       (rhai, blocking pool)
//!                                                               │ sleep(ms)
//!                                                               ▼
//!                                                         wake loop
//!                                                         (scheduler buckets,
//!                                                          advanced every tick)
//!
//!     Cross-cutting: config + route reload (notify, SIGHUP), lifecycle,
//!     observability (tracing, metrics)
//! ```

use std::path::PathBuf;

use clap::Parser;

use vhostd::config::loader::{load_config, ConfigError};
use vhostd::config::validation::validate_config;
use vhostd::config::ServerConfig;
use vhostd::lifecycle::Server;
use vhostd::observability::{init_logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "vhostd", version, about = "Virtual host script server")]
struct Args {
    /// Server configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host route source (rhai script or TOML).
    #[arg(short, long)]
    routes: Option<PathBuf>,

    /// Default document root for unmatched hosts.
    #[arg(long)]
    app: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short, long)]
    bind: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(routes) = &self.routes {
            config.vhost.routes_path = Some(routes.clone());
        }
        if let Some(app) = &self.app {
            config.vhost.app = Some(app.clone());
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
    }
}

/// Blocking threads kept beyond the script budget for file and DNS work.
const BLOCKING_HEADROOM: usize = 16;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    args.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability);
    tracing::info!("vhostd v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        resolution_ms = config.scheduler.resolution_ms,
        bucket_count = config.scheduler.bucket_count,
        max_concurrent_scripts = config.script.max_concurrent,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    // Sleeping scripts hold their blocking thread, so the pool is sized to the script budget.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(config.script.max_concurrent + BLOCKING_HEADROOM)
        .build()?;
    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = Server::build(config)?;
    let listener = server.bind().await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
