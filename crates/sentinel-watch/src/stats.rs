//! Scheduler counters.

use std::sync::atomic::{AtomicU64, Ordering};

use sentinel_models::SkipReason;

use crate::metrics;

/// Per-connection scheduler counters. Every increment is mirrored to the
/// process-wide metrics.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    dispatched: AtomicU64,
    skipped_no_prompt: AtomicU64,
    busy: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    discarded_closed: AtomicU64,
    discarded_stale: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub dispatched: u64,
    pub skipped_no_prompt: u64,
    pub busy: u64,
    pub dropped: u64,
    pub delivered: u64,
    pub discarded_closed: u64,
    pub discarded_stale: u64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick_without_prompt(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.skipped_no_prompt.fetch_add(1, Ordering::Relaxed);
        metrics::record_tick(false);
    }

    pub fn record_dispatch(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        metrics::record_tick(true);
        metrics::record_dispatched();
    }

    /// A completed call that produced nothing to forward.
    pub fn record_skip(&self, reason: SkipReason) {
        if reason == SkipReason::Busy {
            self.busy.fetch_add(1, Ordering::Relaxed);
            metrics::record_busy();
        } else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            metrics::record_dropped(reason.as_str());
        }
    }

    /// An inference task that panicked or was cancelled.
    pub fn record_lost(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_dropped("task_failed");
    }

    /// A result dropped because the outbound channel was full.
    pub fn record_overflow(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::record_dropped("outbound_full");
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        metrics::record_delivered();
    }

    pub fn record_discarded_closed(&self) {
        self.discarded_closed.fetch_add(1, Ordering::Relaxed);
        metrics::record_discarded("closed");
    }

    pub fn record_discarded_stale(&self) {
        self.discarded_stale.fetch_add(1, Ordering::Relaxed);
        metrics::record_discarded("stale");
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            skipped_no_prompt: self.skipped_no_prompt.load(Ordering::Relaxed),
            busy: self.busy.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            discarded_closed: self.discarded_closed.load(Ordering::Relaxed),
            discarded_stale: self.discarded_stale.load(Ordering::Relaxed),
        }
    }
}
