//! Per-guard counters.
//!
//! Each guard owns one [`GuardMetrics`]. Counters only grow; callers export
//! them by reading [`GuardMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Observability counters for one idempotency guard.
#[derive(Debug)]
pub struct GuardMetrics {
    /// `idempotent_executions_total`: operations that ran and were recorded.
    executions_total: AtomicU64,
    /// `idempotent_replays_total`: retries answered from the store.
    replays_total: AtomicU64,
    /// `idempotency_conflicts_total`: key reused with a different fingerprint.
    conflicts_total: AtomicU64,
    /// `idempotent_failures_total`: operations whose execute returned an error.
    failed_executions_total: AtomicU64,
}

/// Point-in-time copy of [`GuardMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardMetricsSnapshot {
    pub executions_total: u64,
    pub replays_total: u64,
    pub conflicts_total: u64,
    pub failed_executions_total: u64,
}

impl GuardMetrics {
    /// Counters starting at zero.
    pub fn new() -> Self {
        Self {
            executions_total: AtomicU64::new(0),
            replays_total: AtomicU64::new(0),
            conflicts_total: AtomicU64::new(0),
            failed_executions_total: AtomicU64::new(0),
        }
    }

    /// An operation ran and its result was recorded.
    pub fn record_execution(&self) {
        self.executions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// A retry was answered from the stored payload.
    pub fn record_replay(&self) {
        self.replays_total.fetch_add(1, Ordering::Relaxed);
    }

    /// A key was reused with a different fingerprint.
    pub fn record_conflict(&self) {
        self.conflicts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// `execute` returned an error; nothing was stored.
    pub fn record_failed_execution(&self) {
        self.failed_executions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of each counter.
    pub fn executions_total(&self) -> u64 {
        self.executions_total.load(Ordering::Relaxed)
    }

    pub fn replays_total(&self) -> u64 {
        self.replays_total.load(Ordering::Relaxed)
    }

    pub fn conflicts_total(&self) -> u64 {
        self.conflicts_total.load(Ordering::Relaxed)
    }

    pub fn failed_executions_total(&self) -> u64 {
        self.failed_executions_total.load(Ordering::Relaxed)
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> GuardMetricsSnapshot {
        GuardMetricsSnapshot {
            executions_total: self.executions_total(),
            replays_total: self.replays_total(),
            conflicts_total: self.conflicts_total(),
            failed_executions_total: self.failed_executions_total(),
        }
    }
}

impl Default for GuardMetrics {
    fn default() -> Self {
        Self::new()
    }
}
