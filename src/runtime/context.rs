//! Per-request execution context and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique execution IDs for scheduling and tracing
//! - Carry the resolved host and document root into the script
//! - Cancel pending sleeps when the request goes away, including sleeps the
//!   script has not reached yet

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::runtime::sleep::SleepClient;

/// Global atomic counter for execution IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static EXECUTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecutionId(u64);

impl ExecutionId {
    /// Generate a new unique execution ID.
    pub fn new() -> Self {
        Self(EXECUTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exec-{}", self.0)
    }
}

/// A running execution: its ID plus a teardown flag shared with its guard.
///
/// The flag is set before the guard's cancel command is sent, so the wake
/// loop sees it on any suspend it handles after that cancel.
#[derive(Debug, Clone)]
pub struct Execution {
    id: ExecutionId,
    cancelled: Arc<AtomicBool>,
}

impl Execution {
    pub fn new() -> Self {
        Self {
            id: ExecutionId::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for Execution {
    fn default() -> Self {
        Self::new()
    }
}

/// What a script execution knows about the request that started it.
#[derive(Debug)]
pub struct RequestContext {
    execution: Execution,
    request_id: String,
    host: Option<String>,
    document_root: PathBuf,
    started: Instant,
    keepalive: AtomicBool,
}

impl RequestContext {
    pub fn new(request_id: impl Into<String>, host: Option<String>, document_root: PathBuf) -> Self {
        Self {
            execution: Execution::new(),
            request_id: request_id.into(),
            host,
            document_root,
            started: Instant::now(),
            keepalive: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.execution.id()
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Host name as sent by the client, without port.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn document_root(&self) -> &Path {
        &self.document_root
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn keepalive(&self) -> bool {
        self.keepalive.load(Ordering::Relaxed)
    }

    pub fn set_keepalive(&self, keepalive: bool) {
        self.keepalive.store(keepalive, Ordering::Relaxed);
    }
}

/// Guard tied to a request's lifetime.
///
/// On drop the execution is marked torn down and any sleep it has pending is
/// cancelled. Sleeps it attempts afterwards end as cancelled at once.
#[derive(Debug)]
pub struct ExecutionGuard {
    execution: Execution,
    sleeper: SleepClient,
}

impl ExecutionGuard {
    pub fn new(execution: Execution, sleeper: SleepClient) -> Self {
        Self { execution, sleeper }
    }

    /// Get the guarded execution's ID.
    pub fn id(&self) -> ExecutionId {
        self.execution.id()
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.execution.cancel();
        self.sleeper.cancel(self.execution.id());
        tracing::trace!(execution = %self.execution.id(), "Execution finished");
    }
}
