//! Replication telemetry counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters tracking transfer activity for one facade.
#[derive(Debug, Default)]
pub struct ReplicaMetrics {
    /// Reads served from an already-current cache file.
    pub cache_hits: AtomicU64,
    /// Master→cache pulls performed by copy-on-read.
    pub pulls: AtomicU64,
    /// Bytes streamed master→cache.
    pub bytes_pulled: AtomicU64,
    /// Cache→master pushes performed on write-stream close.
    pub pushes: AtomicU64,
    /// Bytes streamed cache→master.
    pub bytes_pushed: AtomicU64,
    /// Files deleted through the facade.
    pub deletes: AtomicU64,
}

impl ReplicaMetrics {
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pull(&self, bytes: u64) {
        self.pulls.fetch_add(1, Ordering::Relaxed);
        self.bytes_pulled.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_push(&self, bytes: u64) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.bytes_pushed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    /// Take an immutable snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> ReplicaMetricsSnapshot {
        ReplicaMetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            pulls: self.pulls.load(Ordering::Relaxed),
            bytes_pulled: self.bytes_pulled.load(Ordering::Relaxed),
            pushes: self.pushes.load(Ordering::Relaxed),
            bytes_pushed: self.bytes_pushed.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot of [`ReplicaMetrics`] for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaMetricsSnapshot {
    pub cache_hits: u64,
    pub pulls: u64,
    pub bytes_pulled: u64,
    pub pushes: u64,
    pub bytes_pushed: u64,
    pub deletes: u64,
}
