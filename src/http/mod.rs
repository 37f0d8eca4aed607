//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (host name without port, request ID)
//!     → vhost::SharedDirectory (document root)
//!     → script::ScriptRunner (run index script)
//!     → response.rs (status, headers, body, connection close)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
