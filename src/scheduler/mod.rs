//! Deferred wake scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! Script calls sleep(ms)
//!     → wake.rs (clamp delay, compute wake tick)
//!     → bucket.rs (append to bucket wake_tick % bucket_count)
//!
//! Every scheduler tick:
//!     → wake.rs (now_tick from clock.rs)
//!     → bucket.rs (scan previous + current bucket, unlink due entries)
//!     → Return: owners to resume, in encounter order
//! ```
//!
//! # Design Decisions
//! - Fixed resolution (10ms by default), not a general-purpose timer
//! - O(1) insert and O(1) unlink from any position via index links
//! - Two-bucket scan window tolerates a tick straddling a bucket boundary
//! - Owners are handed back after unlinking; resuming is the caller's job

pub mod bucket;
pub mod clock;
pub mod wake;

pub use bucket::{WakeBucketTable, WakeEntry, WakeKey};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use wake::{Suspension, WakeScheduler};
