//! Virtual host script server library.
//!
//! Requests are routed to a document root by host name and answered by the
//! root's index script. Scripts may sleep; sleeps are parked on a bucketed
//! wake scheduler driven by a single event-loop task.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod runtime;
pub mod scheduler;
pub mod script;
pub mod vhost;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::{Server, Shutdown};
pub use runtime::{SleepClient, WakeLoop};
pub use scheduler::WakeScheduler;
pub use vhost::{HostDirectory, SharedDirectory};
