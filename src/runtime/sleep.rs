//! Script-facing sleep handle.
//!
//! A cloneable front for the wake loop. Each sleep sends a suspend command
//! carrying a oneshot continuation and then parks on the receiving end,
//! either awaiting it or, from a blocking script thread, blocking on it.

use tokio::sync::{mpsc, oneshot};

use crate::observability::metrics;
use crate::runtime::context::{Execution, ExecutionId};
use crate::runtime::event_loop::{Command, Wake};

/// How a sleep request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// Delay below one millisecond; nothing was suspended.
    Skipped,
    /// The wake tick arrived.
    Elapsed,
    /// Woken early by an external resume.
    Resumed,
    /// The scheduler could not record the sleep; continue immediately.
    Declined,
    /// The request was torn down while suspended.
    Cancelled,
}

impl SleepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SleepOutcome::Skipped => "skipped",
            SleepOutcome::Elapsed => "elapsed",
            SleepOutcome::Resumed => "resumed",
            SleepOutcome::Declined => "declined",
            SleepOutcome::Cancelled => "cancelled",
        }
    }
}

/// Handle for suspending executions on the wake loop.
#[derive(Debug, Clone)]
pub struct SleepClient {
    commands: mpsc::UnboundedSender<Command>,
}

impl SleepClient {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>) -> Self {
        Self { commands }
    }

    /// Suspend `execution` for `delay_ms` milliseconds.
    pub async fn sleep(&self, execution: &Execution, delay_ms: i64) -> SleepOutcome {
        let outcome = match self.submit(execution, delay_ms) {
            Ok(waiter) => into_outcome(waiter.await),
            Err(outcome) => outcome,
        };
        metrics::record_sleep(outcome.as_str());
        outcome
    }

    /// Blocking variant for executions running outside the async runtime.
    ///
    /// Must not be called from an async context.
    pub fn sleep_blocking(&self, execution: &Execution, delay_ms: i64) -> SleepOutcome {
        let outcome = match self.submit(execution, delay_ms) {
            Ok(waiter) => into_outcome(waiter.blocking_recv()),
            Err(outcome) => outcome,
        };
        metrics::record_sleep(outcome.as_str());
        outcome
    }

    /// Wake a suspended execution now, timed or indefinite.
    pub fn resume(&self, execution: ExecutionId) -> bool {
        self.commands.send(Command::Resume(execution)).is_ok()
    }

    /// Drop whatever the execution has pending. The sleeper sees `Cancelled`.
    pub fn cancel(&self, execution: ExecutionId) -> bool {
        self.commands.send(Command::Cancel(execution)).is_ok()
    }

    /// Queue a suspend command and return the continuation to park on.
    pub(crate) fn submit(
        &self,
        execution: &Execution,
        delay_ms: i64,
    ) -> Result<oneshot::Receiver<Wake>, SleepOutcome> {
        if execution.is_cancelled() {
            return Err(SleepOutcome::Cancelled);
        }
        if delay_ms < 1 {
            return Err(SleepOutcome::Skipped);
        }

        let (resume, waiter) = oneshot::channel();
        let command = Command::Suspend {
            execution: execution.clone(),
            delay_ms: delay_ms as u64,
            resume,
        };

        if self.commands.send(command).is_err() {
            tracing::warn!(execution = %execution.id(), "Wake loop is gone, not suspending");
            return Err(SleepOutcome::Declined);
        }

        Ok(waiter)
    }
}

pub(crate) fn into_outcome(wake: Result<Wake, oneshot::error::RecvError>) -> SleepOutcome {
    match wake {
        Ok(Wake::Elapsed) => SleepOutcome::Elapsed,
        Ok(Wake::Resumed) => SleepOutcome::Resumed,
        Ok(Wake::Declined) => SleepOutcome::Declined,
        Err(_) => SleepOutcome::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_positive_delay_is_skipped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = SleepClient::new(tx);
        let execution = Execution::new();

        assert_eq!(client.sleep(&execution, 0).await, SleepOutcome::Skipped);
        assert_eq!(client.sleep(&execution, -5).await, SleepOutcome::Skipped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_declines_without_wake_loop() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let client = SleepClient::new(tx);
        assert_eq!(client.sleep(&Execution::new(), 100).await, SleepOutcome::Declined);
    }

    #[tokio::test]
    async fn test_torn_down_execution_does_not_suspend() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = SleepClient::new(tx);
        let execution = Execution::new();
        execution.cancel();

        assert_eq!(client.sleep(&execution, 100).await, SleepOutcome::Cancelled);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_continuation_means_cancelled() {
        let (resume, waiter) = oneshot::channel::<Wake>();
        drop(resume);
        assert_eq!(into_outcome(waiter.blocking_recv()), SleepOutcome::Cancelled);
    }
}
