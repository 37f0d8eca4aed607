//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! server config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!
//! route source (rhai script / TOML table)
//!     → routes.rs (evaluate to ordered host → root table)
//!     → vhost::SharedDirectory (merge & publish)
//!
//! On route change:
//!     watcher.rs detects change
//!     → routes.rs loads new table
//!     → channel to the HTTP server, which applies it
//!     → failed loads keep the current routes
//! ```
//!
//! # Design Decisions
//! - Server config is immutable once loaded; only host routes reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod routes;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::ServerConfig;
pub use schema::ListenerConfig;
pub use schema::SchedulerConfig;
pub use schema::VhostConfig;
pub use schema::ScriptConfig;
pub use schema::TimeoutConfig;
pub use schema::ObservabilityConfig;
pub use routes::RouteTable;
