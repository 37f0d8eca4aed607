//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use vhostd::config::{RouteTable, ServerConfig};
use vhostd::http::HttpServer;
use vhostd::lifecycle::Shutdown;
use vhostd::runtime::WakeLoop;
use vhostd::scheduler::MonotonicClock;
use vhostd::vhost::{HostDirectory, SharedDirectory};

static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh empty directory under the system temp dir.
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "vhostd-{}-{}-{}",
        name,
        std::process::id(),
        DIR_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Create `<base>/<name>/index.rhai` holding `script` and return the site root.
pub fn write_site(base: &Path, name: &str, script: &str) -> PathBuf {
    let root = base.join(name);
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(root.join("index.rhai"), script).unwrap();
    root
}

#[allow(dead_code)]
pub fn route(host: &str, root: &Path) -> (String, String) {
    (host.to_string(), root.display().to_string())
}

#[allow(dead_code)]
pub struct TestServer {
    pub addr: SocketAddr,
    pub directory: SharedDirectory,
    pub route_updates: mpsc::UnboundedSender<RouteTable>,
    pub shutdown: Shutdown,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

#[allow(dead_code)]
/// Start an HTTP server with its own wake loop on an ephemeral port.
pub async fn start_server(config: ServerConfig, routes: RouteTable) -> TestServer {
    let directory = SharedDirectory::new(HostDirectory::from_config(&config.vhost));
    directory.apply(&routes);

    let shutdown = Shutdown::new();
    let (wake_loop, sleeper) = WakeLoop::new(&config.scheduler, Arc::new(MonotonicClock::new()));
    tokio::spawn(wake_loop.run(shutdown.subscribe()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (route_updates, updates_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(config, directory.clone(), sleeper);
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestServer {
        addr,
        directory,
        route_updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
