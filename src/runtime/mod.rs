//! Execution runtime: the wake loop and its clients.
//!
//! # Data Flow
//! ```text
//! Script calls sleep(ms)
//!     → sleep.rs (SleepClient: suspend command + oneshot continuation)
//!     → event_loop.rs (WakeLoop: record in scheduler)
//!     → script thread parks on the continuation
//!
//! Every tick_interval_ms:
//!     → event_loop.rs advance()
//!     → scheduler tick: due entries unlinked
//!     → continuations completed, scripts continue on their own threads
//!
//! Request teardown:
//!     → context.rs ExecutionGuard dropped
//!     → Cancel command: pending entry removed, sleeper sees Cancelled
//! ```

pub mod context;
pub mod event_loop;
pub mod sleep;

pub use context::{Execution, ExecutionGuard, ExecutionId, RequestContext};
pub use event_loop::{Wake, WakeLoop};
pub use sleep::{SleepClient, SleepOutcome};
