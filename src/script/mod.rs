//! Request script subsystem.
//!
//! # Data Flow
//! ```text
//! RequestContext (host, document root)
//!     → runner.rs (pick script, run on blocking pool)
//!     → bindings.rs (echo/header/status/sleep/... into ScriptState)
//!     → ScriptOutput (status, headers, body) back to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - rhai is synchronous; each run owns a fresh engine on a blocking thread
//! - Operation budget bounds runaway scripts

pub mod bindings;
pub mod runner;

pub use bindings::ScriptOutput;
pub use runner::{ScriptError, ScriptRunner};
