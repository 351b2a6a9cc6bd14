//! Counters for the batching cache
//!
//! - Counters only, monotonic
//! - Reset only when the registry is created
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by a [`BatchingStorage`](crate::batch::BatchingStorage)
/// and its clones.
///
/// Uses Relaxed ordering; counters are read for reporting only.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Lookups answered from the request cache
    cache_hits: AtomicU64,
    /// Lookups that created a cache entry
    cache_misses: AtomicU64,
    /// Pending queues flushed
    batches_flushed: AtomicU64,
    /// Lookups answered by a shared multi-identifier call
    lookups_coalesced: AtomicU64,
    /// Calls made to the wrapped backend
    backend_calls: AtomicU64,
    /// Flushes or queries that failed
    batch_failures: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batches_flushed(&self) {
        self.batches_flushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_lookups_coalesced(&self, count: u64) {
        self.lookups_coalesced.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_backend_calls(&self) {
        self.backend_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_batch_failures(&self) {
        self.batch_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn backend_calls(&self) -> u64 {
        self.backend_calls.load(Ordering::Relaxed)
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            batches_flushed: self.batches_flushed.load(Ordering::Relaxed),
            lookups_coalesced: self.lookups_coalesced.load(Ordering::Relaxed),
            backend_calls: self.backend_calls.load(Ordering::Relaxed),
            batch_failures: self.batch_failures.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub batches_flushed: u64,
    pub lookups_coalesced: u64,
    pub backend_calls: u64,
    pub batch_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_increment() {
        let metrics = MetricsRegistry::new();
        metrics.increment_cache_hits();
        metrics.increment_cache_misses();
        metrics.increment_cache_misses();
        metrics.increment_batches_flushed();
        metrics.add_lookups_coalesced(3);
        metrics.increment_backend_calls();
        metrics.increment_batch_failures();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.batches_flushed, 1);
        assert_eq!(snapshot.lookups_coalesced, 3);
        assert_eq!(snapshot.backend_calls, 1);
        assert_eq!(snapshot.batch_failures, 1);
        assert_eq!(metrics.backend_calls(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_value(MetricsRegistry::new().snapshot()).unwrap();
        assert_eq!(json["backend_calls"], 0);
    }
}
