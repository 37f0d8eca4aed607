//! Deferred wake scheduler.
//!
//! # Responsibilities
//! - Turn a requested delay into a wake tick and record it
//! - Scan due buckets once per scheduler tick
//! - Catch up on every bucket passed over when the caller runs late
//! - Hand due owners back to the caller for resumption
//!
//! # Design Decisions
//! - Delays round up to whole ticks and never resolve to "already due"
//! - Delays above `max_sleep_ms` are indefinite: no entry is recorded
//! - Capacity is bounded by `max_pending`; over capacity the suspension is declined

use crate::config::SchedulerConfig;
use crate::scheduler::bucket::{WakeBucketTable, WakeKey};

/// Result of a suspension request.
#[derive(Debug)]
pub enum Suspension<T> {
    /// Recorded; the owner comes back from [`WakeScheduler::tick`] at `wake_tick`.
    Scheduled { key: WakeKey, wake_tick: u64 },
    /// Beyond the ceiling. Nothing recorded; only an outside resume revives it.
    Indefinite(T),
    /// Could not be recorded. The caller must not yield.
    Declined(T),
}

/// Time-bucketed record of suspended executions.
#[derive(Debug)]
pub struct WakeScheduler<T> {
    table: WakeBucketTable<T>,
    resolution_ms: u64,
    max_sleep_ms: u64,
    max_pending: usize,
    scanned_through: Option<u64>,
}

impl<T> WakeScheduler<T> {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            table: WakeBucketTable::new(config.bucket_count),
            resolution_ms: config.resolution_ms.max(1),
            max_sleep_ms: config.max_sleep_ms,
            max_pending: config.max_pending,
            scanned_through: None,
        }
    }

    /// Coarse tick for a millisecond timestamp.
    pub fn tick_at(&self, now_ms: u64) -> u64 {
        now_ms / self.resolution_ms
    }

    /// Record `owner` to be woken `delay_ms` from `now_ms`.
    pub fn suspend(&mut self, owner: T, delay_ms: u64, now_ms: u64) -> Suspension<T> {
        if delay_ms > self.max_sleep_ms {
            return Suspension::Indefinite(owner);
        }

        if self.table.len() >= self.max_pending {
            tracing::warn!(
                pending = self.table.len(),
                max_pending = self.max_pending,
                "Wake table full, declining suspension"
            );
            return Suspension::Declined(owner);
        }

        let ticks = delay_ms.div_ceil(self.resolution_ms).max(1);
        let wake_tick = self.tick_at(now_ms).saturating_add(ticks);

        match self.table.try_push_back(wake_tick, owner) {
            Ok(key) => {
                tracing::trace!(
                    wake_tick,
                    bucket = self.table.bucket_of(wake_tick),
                    "Suspension scheduled"
                );
                Suspension::Scheduled { key, wake_tick }
            }
            Err(owner) => {
                tracing::warn!(wake_tick, "Wake entry allocation failed, declining suspension");
                Suspension::Declined(owner)
            }
        }
    }

    /// Unlink every entry due at `now_ms` and return the owners.
    ///
    /// Only the previous and the current bucket are scanned.
    pub fn tick(&mut self, now_ms: u64) -> Vec<T> {
        let now_tick = self.tick_at(now_ms);
        let buckets = self.table.bucket_count() as u64;
        let current = (now_tick % buckets) as usize;
        let previous = ((now_tick + buckets - 1) % buckets) as usize;

        let mut due = Vec::new();
        if previous != current {
            self.table.drain_due(previous, now_tick, &mut due);
        }
        self.table.drain_due(current, now_tick, &mut due);
        self.scanned_through = Some(now_tick);
        due
    }

    /// Unlink every entry due at `now_ms`, scanning each bucket passed over
    /// since the previous call as well as the usual two-bucket window.
    ///
    /// A stalled or slow caller therefore never strands an entry for a lap.
    /// At most one full lap of buckets is scanned.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<T> {
        let now_tick = self.tick_at(now_ms);
        let buckets = self.table.bucket_count() as u64;

        let first = self
            .scanned_through
            .unwrap_or(now_tick)
            .min(now_tick.saturating_sub(1));
        let span = (now_tick - first + 1).min(buckets);

        let mut due = Vec::new();
        for tick in (now_tick + 1 - span)..=now_tick {
            self.table.drain_due((tick % buckets) as usize, now_tick, &mut due);
        }
        self.scanned_through = Some(now_tick);
        due
    }

    /// Drop a pending suspension and give its owner back.
    pub fn cancel(&mut self, key: WakeKey) -> Option<T> {
        self.table.remove(key).map(|entry| entry.into_owner())
    }

    /// Wake tick of a pending suspension.
    pub fn wake_tick_of(&self, key: WakeKey) -> Option<u64> {
        self.table.get(key).map(|entry| entry.wake_tick())
    }

    pub fn pending(&self) -> usize {
        self.table.len()
    }

    pub fn table(&self) -> &WakeBucketTable<T> {
        &self.table
    }
}
