//! Gateway counters
//!
//! Lock-free counters shared by the gateway, processor and sweeper, plus a
//! serializable snapshot for status output.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Global counters (thread-safe)
#[derive(Debug, Default)]
pub struct GatewayMetrics {
    admitted: AtomicU64,
    rejected: AtomicU64,
    enqueue_failed: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    abandoned: AtomicU64,
    drained: AtomicU64,
    expired: AtomicU64,
}

/// Point-in-time copy of [`GatewayMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Requests that passed the limiter
    pub admitted: u64,
    /// Requests turned away by the limiter
    pub rejected: u64,
    /// Admitted requests the queue refused (full or closed)
    pub enqueue_failed: u64,
    /// Handler ran and succeeded
    pub processed: u64,
    /// Handler errored, panicked or timed out
    pub failed: u64,
    /// Responses nobody was waiting for any more
    pub abandoned: u64,
    /// Requests failed because the service stopped before reaching them
    pub drained: u64,
    /// Detached tickets removed by the sweeper
    pub expired: u64,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueue_failed(&self) {
        self.enqueue_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drained(&self) {
        self.drained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, count: u64) {
        self.expired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            enqueue_failed: self.enqueue_failed.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Requests that have received their one response
    pub fn completed(&self) -> u64 {
        self.processed + self.failed + self.drained
    }
}
