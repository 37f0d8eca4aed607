//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the script handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Resolve each request's document root and run its script
//! - Apply host route updates while serving

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{RouteTable, ServerConfig};
use crate::http::{request, response};
use crate::observability::metrics;
use crate::runtime::{ExecutionGuard, RequestContext, SleepClient};
use crate::script::ScriptRunner;
use crate::vhost::SharedDirectory;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub directory: SharedDirectory,
    pub scripts: Arc<ScriptRunner>,
    pub sleeper: SleepClient,
}

/// HTTP front of the virtual host server.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    directory: SharedDirectory,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ServerConfig, directory: SharedDirectory, sleeper: SleepClient) -> Self {
        let scripts = Arc::new(ScriptRunner::new(
            sleeper.clone(),
            config.script.clone(),
            Duration::from_secs(config.timeouts.process_secs),
        ));

        let state = AppState {
            directory: directory.clone(),
            scripts,
            sleeper,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            directory,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .fallback(script_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::SERVER,
                HeaderValue::from_static(concat!("vhostd/", env!("CARGO_PKG_VERSION"))),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Route tables arriving on `route_updates` are applied to the shared
    /// directory until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut route_updates: mpsc::UnboundedReceiver<RouteTable>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            hosts = self.directory.snapshot().len(),
            "HTTP server starting"
        );

        let directory = self.directory.clone();
        let updates = tokio::spawn(async move {
            while let Some(routes) = route_updates.recv().await {
                directory.apply(&routes);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        updates.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Resolve the document root for the request's host and run its script.
async fn script_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request::request_id(request.headers());
    let host = request::request_host(request.headers(), request.uri());
    let document_root = state.directory.resolve_owned(host.as_deref());

    tracing::debug!(
        request_id = %request_id,
        host = host.as_deref().unwrap_or(""),
        root = %document_root.display(),
        path = %request.uri().path(),
        "Dispatching request"
    );

    let context = Arc::new(RequestContext::new(request_id, host, document_root));
    // Dropped with this future, including when the client goes away.
    let _guard = ExecutionGuard::new(context.execution().clone(), state.sleeper.clone());

    let response = match state.scripts.run(context.clone()).await {
        Ok(output) => response::from_output(output, context.keepalive()),
        Err(e) => {
            tracing::warn!(
                request_id = %context.request_id(),
                execution = %context.id(),
                error = %e,
                "Script execution failed"
            );
            response::from_error(&e, context.keepalive())
        }
    };

    metrics::record_request(response.status().as_u16(), start_time);
    response
}
