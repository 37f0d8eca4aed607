//! Wake loop: the single owner of the deferred wake scheduler.
//!
//! # Responsibilities
//! - Apply suspend / resume / cancel commands from sleep clients
//! - Advance the scheduler on a fixed cadence
//! - Complete continuations of due executions
//!
//! # Design Decisions
//! - One task owns the scheduler; commands and ticks are serialized, no locks
//! - Resuming only completes a oneshot; the execution continues elsewhere,
//!   so nothing a resumed script does can re-enter `advance`
//! - Indefinite sleeps are parked outside the bucket table
//! - Each advance scans every bucket passed over since the last one, so a
//!   late timer or a stalled runtime delays wakes but never strands them
//! - Suspends from executions already torn down are refused as cancelled
//! - A continuation whose receiver is gone is a stale wake: logged, counted, dropped

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};

use crate::config::SchedulerConfig;
use crate::observability::metrics;
use crate::runtime::context::{Execution, ExecutionId};
use crate::runtime::sleep::SleepClient;
use crate::scheduler::{Clock, Suspension, WakeKey, WakeScheduler};

/// Value delivered to a suspended execution's continuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Resumed,
    Declined,
}

#[derive(Debug)]
pub(crate) enum Command {
    Suspend {
        execution: Execution,
        delay_ms: u64,
        resume: oneshot::Sender<Wake>,
    },
    Resume(ExecutionId),
    Cancel(ExecutionId),
}

/// Owner stored in a wake entry.
#[derive(Debug)]
struct Parked {
    execution: ExecutionId,
    resume: oneshot::Sender<Wake>,
}

#[derive(Debug)]
enum Waiting {
    Timed(WakeKey),
    Indefinite(oneshot::Sender<Wake>),
}

enum Event {
    Tick,
    Command(Option<Command>),
    Shutdown,
}

/// Event-loop side of the scheduler.
pub struct WakeLoop {
    scheduler: WakeScheduler<Parked>,
    clock: Arc<dyn Clock>,
    commands: mpsc::UnboundedReceiver<Command>,
    waiting: HashMap<ExecutionId, Waiting>,
    tick_interval: Duration,
}

impl WakeLoop {
    /// Create the loop and a client for submitting sleeps to it.
    pub fn new(config: &SchedulerConfig, clock: Arc<dyn Clock>) -> (Self, SleepClient) {
        let (tx, rx) = mpsc::unbounded_channel();
        let wake_loop = Self {
            scheduler: WakeScheduler::new(config),
            clock,
            commands: rx,
            waiting: HashMap::new(),
            tick_interval: Duration::from_millis(config.tick_interval_ms.max(1)),
        };
        (wake_loop, SleepClient::new(tx))
    }

    /// Timed sleeps currently in the bucket table.
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// All suspended executions, timed and indefinite.
    pub fn suspended(&self) -> usize {
        self.waiting.len()
    }

    /// Run until shutdown or until every sleep client is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            "Wake loop starting"
        );

        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let event = tokio::select! {
                _ = ticker.tick() => Event::Tick,
                command = self.commands.recv() => Event::Command(command),
                _ = shutdown.recv() => Event::Shutdown,
            };

            match event {
                Event::Tick => {
                    self.advance();
                }
                Event::Command(Some(command)) => self.handle(command),
                Event::Command(None) => {
                    tracing::info!("All sleep clients dropped, wake loop exiting");
                    break;
                }
                Event::Shutdown => {
                    tracing::info!("Wake loop received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        tracing::info!(suspended = self.waiting.len(), "Wake loop stopped");
    }

    /// Resume every execution due now. Returns how many were resumed.
    pub fn advance(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        let due = self.scheduler.advance_to(now_ms);
        let resumed = due.len();

        for parked in due {
            self.waiting.remove(&parked.execution);
            if parked.resume.send(Wake::Elapsed).is_err() {
                tracing::debug!(execution = %parked.execution, "Wake target no longer exists");
                metrics::record_stale_wake();
            }
        }

        if resumed > 0 {
            tracing::trace!(resumed, now_ms, "Scheduler tick");
            metrics::record_resumed(resumed);
            metrics::set_pending_sleeps(self.scheduler.pending());
        }
        resumed
    }

    /// Apply every command already queued, without waiting.
    pub fn drain_commands(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.handle(command);
            applied += 1;
        }
        applied
    }

    pub(crate) fn handle(&mut self, command: Command) {
        match command {
            Command::Suspend {
                execution,
                delay_ms,
                resume,
            } => self.suspend(execution, delay_ms, resume),
            Command::Resume(execution) => self.resume(execution),
            Command::Cancel(execution) => {
                if let Some(waiting) = self.waiting.remove(&execution) {
                    tracing::debug!(execution = %execution, "Cancelling pending sleep");
                    self.release(waiting);
                }
            }
        }
    }

    fn suspend(&mut self, execution: Execution, delay_ms: u64, resume: oneshot::Sender<Wake>) {
        // Dropping `resume` is what the sleeper observes as cancelled.
        if execution.is_cancelled() {
            tracing::debug!(execution = %execution.id(), "Execution already torn down, not suspending");
            return;
        }

        let execution = execution.id();
        // One suspension per execution; a newer one replaces the old.
        if let Some(previous) = self.waiting.remove(&execution) {
            self.release(previous);
        }

        let now_ms = self.clock.now_ms();
        match self.scheduler.suspend(Parked { execution, resume }, delay_ms, now_ms) {
            Suspension::Scheduled { key, wake_tick } => {
                tracing::trace!(execution = %execution, delay_ms, wake_tick, "Execution suspended");
                self.waiting.insert(execution, Waiting::Timed(key));
                metrics::set_pending_sleeps(self.scheduler.pending());
            }
            Suspension::Indefinite(parked) => {
                tracing::debug!(execution = %execution, delay_ms, "Execution suspended indefinitely");
                self.waiting.insert(execution, Waiting::Indefinite(parked.resume));
            }
            Suspension::Declined(parked) => {
                let _ = parked.resume.send(Wake::Declined);
            }
        }
    }

    fn resume(&mut self, execution: ExecutionId) {
        let resume = match self.waiting.remove(&execution) {
            Some(Waiting::Timed(key)) => self.scheduler.cancel(key).map(|parked| parked.resume),
            Some(Waiting::Indefinite(resume)) => Some(resume),
            None => None,
        };

        match resume {
            Some(resume) => {
                if resume.send(Wake::Resumed).is_err() {
                    metrics::record_stale_wake();
                }
            }
            None => tracing::debug!(execution = %execution, "Nothing to resume"),
        }
    }

    fn release(&mut self, waiting: Waiting) {
        match waiting {
            Waiting::Timed(key) => {
                self.scheduler.cancel(key);
            }
            Waiting::Indefinite(resume) => drop(resume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::sleep::{into_outcome, SleepOutcome};
    use crate::scheduler::ManualClock;

    fn setup(now_ms: u64) -> (WakeLoop, SleepClient, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now_ms));
        let (wake_loop, client) = WakeLoop::new(&SchedulerConfig::default(), clock.clone());
        (wake_loop, client, clock)
    }

    #[test]
    fn test_sleep_elapses_on_wake_tick() {
        let (mut wake_loop, client, clock) = setup(1_000);
        let execution = Execution::new();

        let mut waiter = client.submit(&execution, 5).unwrap();
        assert_eq!(wake_loop.drain_commands(), 1);
        assert_eq!(wake_loop.pending(), 1);

        assert_eq!(wake_loop.advance(), 0);
        assert!(waiter.try_recv().is_err());

        clock.set(1_010);
        assert_eq!(wake_loop.advance(), 1);
        assert_eq!(waiter.try_recv(), Ok(Wake::Elapsed));
        assert_eq!(wake_loop.suspended(), 0);
    }

    #[test]
    fn test_cancel_drops_continuation() {
        let (mut wake_loop, client, clock) = setup(0);
        let execution = Execution::new();

        let waiter = client.submit(&execution, 100).unwrap();
        client.cancel(execution.id());
        wake_loop.drain_commands();
        assert_eq!(wake_loop.pending(), 0);
        assert_eq!(into_outcome(waiter.blocking_recv()), SleepOutcome::Cancelled);

        clock.set(100);
        assert_eq!(wake_loop.advance(), 0);
    }

    #[test]
    fn test_indefinite_sleep_needs_external_resume() {
        let (mut wake_loop, client, clock) = setup(0);
        let execution = Execution::new();

        let mut waiter = client.submit(&execution, 1_000_001).unwrap();
        wake_loop.drain_commands();
        assert_eq!(wake_loop.pending(), 0);
        assert_eq!(wake_loop.suspended(), 1);

        clock.set(10_000_000);
        wake_loop.advance();
        assert!(waiter.try_recv().is_err());

        client.resume(execution.id());
        wake_loop.drain_commands();
        assert_eq!(waiter.try_recv(), Ok(Wake::Resumed));
    }

    #[test]
    fn test_external_resume_of_timed_sleep() {
        let (mut wake_loop, client, _clock) = setup(0);
        let execution = Execution::new();

        let mut waiter = client.submit(&execution, 5_000).unwrap();
        client.resume(execution.id());
        wake_loop.drain_commands();
        assert_eq!(waiter.try_recv(), Ok(Wake::Resumed));
        assert_eq!(wake_loop.pending(), 0);
    }

    #[test]
    fn test_stale_wake_is_dropped() {
        let (mut wake_loop, client, clock) = setup(0);
        let gone = Execution::new();
        let alive = Execution::new();

        drop(client.submit(&gone, 10).unwrap());
        let mut waiter = client.submit(&alive, 10).unwrap();
        wake_loop.drain_commands();

        clock.set(10);
        assert_eq!(wake_loop.advance(), 2);
        assert_eq!(waiter.try_recv(), Ok(Wake::Elapsed));
    }

    #[test]
    fn test_declined_when_full() {
        let clock = Arc::new(ManualClock::new(0));
        let config = SchedulerConfig {
            max_pending: 1,
            ..SchedulerConfig::default()
        };
        let (mut wake_loop, client) = WakeLoop::new(&config, clock);

        let _first = client.submit(&Execution::new(), 10).unwrap();
        let mut second = client.submit(&Execution::new(), 10).unwrap();
        wake_loop.drain_commands();
        assert_eq!(second.try_recv(), Ok(Wake::Declined));
    }

    #[test]
    fn test_resuspend_replaces_previous() {
        let (mut wake_loop, client, clock) = setup(0);
        let execution = Execution::new();

        let old = client.submit(&execution, 50).unwrap();
        let mut new = client.submit(&execution, 20).unwrap();
        wake_loop.drain_commands();
        assert_eq!(wake_loop.pending(), 1);
        assert_eq!(into_outcome(old.blocking_recv()), SleepOutcome::Cancelled);

        clock.set(20);
        wake_loop.advance();
        assert_eq!(new.try_recv(), Ok(Wake::Elapsed));
    }

    #[test]
    fn test_suspend_after_teardown_is_cancelled() {
        let (mut wake_loop, client, _clock) = setup(0);
        let execution = Execution::new();

        // submitted while alive, torn down before the loop handles it
        let waiter = client.submit(&execution, 5_000_000).unwrap();
        execution.cancel();
        client.cancel(execution.id());
        wake_loop.drain_commands();

        assert_eq!(wake_loop.suspended(), 0);
        assert_eq!(into_outcome(waiter.blocking_recv()), SleepOutcome::Cancelled);
    }

    #[test]
    fn test_cancel_handled_before_late_suspend() {
        let (mut wake_loop, client, _clock) = setup(0);
        let execution = Execution::new();
        let resume_side = execution.clone();

        execution.cancel();
        client.cancel(execution.id());
        wake_loop.drain_commands();

        let (resume, waiter) = oneshot::channel();
        wake_loop.handle(Command::Suspend {
            execution: resume_side,
            delay_ms: 100,
            resume,
        });
        assert_eq!(wake_loop.pending(), 0);
        assert_eq!(into_outcome(waiter.blocking_recv()), SleepOutcome::Cancelled);
    }

    #[test]
    fn test_stalled_advance_wakes_overdue_sleepers() {
        let (mut wake_loop, client, clock) = setup(0);
        wake_loop.advance();

        let first = Execution::new();
        let second = Execution::new();
        let mut a = client.submit(&first, 10).unwrap();
        let mut b = client.submit(&second, 30).unwrap();
        wake_loop.drain_commands();

        // nothing ran for six ticks
        clock.set(60);
        assert_eq!(wake_loop.advance(), 2);
        assert_eq!(a.try_recv(), Ok(Wake::Elapsed));
        assert_eq!(b.try_recv(), Ok(Wake::Elapsed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_wakes_sleepers_on_cadence() {
        let clock = Arc::new(crate::scheduler::MonotonicClock::new());
        let (wake_loop, client) = WakeLoop::new(&SchedulerConfig::default(), clock);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(wake_loop.run(shutdown_rx));

        let start = time::Instant::now();
        let outcome = client.sleep(&Execution::new(), 50).await;
        assert_eq!(outcome, SleepOutcome::Elapsed);
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(50), "woke after {:?}", waited);
        assert!(waited <= Duration::from_millis(70), "woke after {:?}", waited);

        let _ = shutdown_tx.send(());
        handle.await.unwrap();
    }
}
