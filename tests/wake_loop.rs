//! Wake loop behaviour under tokio's paused clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

use vhostd::config::SchedulerConfig;
use vhostd::runtime::{Execution, ExecutionGuard, SleepClient, SleepOutcome, WakeLoop};
use vhostd::scheduler::MonotonicClock;

fn start() -> (SleepClient, broadcast::Sender<()>) {
    start_with(&SchedulerConfig::default())
}

fn start_with(config: &SchedulerConfig) -> (SleepClient, broadcast::Sender<()>) {
    let (wake_loop, client) = WakeLoop::new(config, Arc::new(MonotonicClock::new()));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(wake_loop.run(shutdown_rx));
    (client, shutdown_tx)
}

#[tokio::test(start_paused = true)]
async fn test_sleepers_wake_in_deadline_order() {
    let (client, _shutdown) = start();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    for delay in [300i64, 100, 200, 7_000] {
        let client = client.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = client.sleep(&Execution::new(), delay).await;
            let _ = done_tx.send((delay, outcome));
        });
    }
    drop(done_tx);

    let mut order = Vec::new();
    while let Some((delay, outcome)) = done_rx.recv().await {
        assert_eq!(outcome, SleepOutcome::Elapsed);
        order.push(delay);
    }
    // 7s is beyond one lap of the bucket table and still wakes on time.
    assert_eq!(order, vec![100, 200, 300, 7_000]);
}

#[tokio::test(start_paused = true)]
async fn test_no_wake_before_deadline() {
    let (client, _shutdown) = start();

    let begin = Instant::now();
    let outcome = client.sleep(&Execution::new(), 95).await;
    assert_eq!(outcome, SleepOutcome::Elapsed);
    assert!(begin.elapsed() >= Duration::from_millis(95));
}

#[tokio::test(start_paused = true)]
async fn test_guard_drop_cancels_sleep() {
    let (client, _shutdown) = start();
    let execution = Execution::new();
    let guard = ExecutionGuard::new(execution.clone(), client.clone());

    let sleeper = tokio::spawn({
        let client = client.clone();
        async move { client.sleep(&execution, 60_000).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(guard);
    assert_eq!(sleeper.await.unwrap(), SleepOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_indefinite_sleep_resumed_externally() {
    let (client, _shutdown) = start();
    let execution = Execution::new();
    let id = execution.id();

    let sleeper = tokio::spawn({
        let client = client.clone();
        async move { client.sleep(&execution, 5_000_000).await }
    });

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!sleeper.is_finished());

    client.resume(id);
    assert_eq!(sleeper.await.unwrap(), SleepOutcome::Resumed);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_after_shutdown_declines() {
    let (client, shutdown) = start();
    shutdown.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(client.sleep(&Execution::new(), 10).await, SleepOutcome::Declined);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_after_guard_drop_is_cancelled() {
    let (client, _shutdown) = start();
    let execution = Execution::new();
    drop(ExecutionGuard::new(execution.clone(), client.clone()));
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(client.sleep(&execution, 60_000).await, SleepOutcome::Cancelled);
    assert_eq!(client.sleep(&execution, 5_000_000).await, SleepOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_guard_drop_racing_suspend_still_cancels() {
    let (client, _shutdown) = start();
    let execution = Execution::new();
    let guard = ExecutionGuard::new(execution.clone(), client.clone());

    // Suspend is queued before the cancel, and the cancel before the loop runs.
    let sleeper = tokio::spawn({
        let client = client.clone();
        let execution = execution.clone();
        async move { client.sleep(&execution, 5_000_000).await }
    });
    tokio::task::yield_now().await;
    drop(guard);

    let outcome = tokio::time::timeout(Duration::from_secs(60), sleeper)
        .await
        .expect("sleeper left parked")
        .unwrap();
    assert_eq!(outcome, SleepOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_slow_cadence_does_not_skip_buckets() {
    let config = SchedulerConfig {
        tick_interval_ms: 30,
        ..SchedulerConfig::default()
    };
    let (client, _shutdown) = start_with(&config);

    let begin = Instant::now();
    for delay in [10i64, 20, 40, 70] {
        let outcome = client.sleep(&Execution::new(), delay).await;
        assert_eq!(outcome, SleepOutcome::Elapsed);
        let waited = begin.elapsed();
        assert!(waited >= Duration::from_millis(delay as u64), "woke after {:?}", waited);
    }
    // Four sleeps back to back, each late by at most one 30ms interval.
    assert!(begin.elapsed() <= Duration::from_millis(140 + 4 * 30), "took {:?}", begin.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_stalled_loop_catches_up() {
    let (client, _shutdown) = start();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    for delay in [20i64, 40, 60] {
        let client = client.clone();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let outcome = client.sleep(&Execution::new(), delay).await;
            let _ = done_tx.send(outcome);
        });
    }
    drop(done_tx);
    tokio::time::sleep(Duration::from_millis(1)).await;

    // One jump past every deadline, as after a stalled runtime.
    tokio::time::advance(Duration::from_millis(200)).await;

    let begin = Instant::now();
    let mut woken = 0;
    while let Some(outcome) = done_rx.recv().await {
        assert_eq!(outcome, SleepOutcome::Elapsed);
        woken += 1;
    }
    assert_eq!(woken, 3);
    assert!(begin.elapsed() <= Duration::from_millis(20), "caught up after {:?}", begin.elapsed());
}
