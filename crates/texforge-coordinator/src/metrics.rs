//! Coordinator counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tracing::info;

/// Atomic counters for coordinator dispatch decisions.
#[derive(Debug)]
pub struct CoordinatorMetrics {
    /// Calls made into the backend (sync upscale or async submit).
    pub backend_invocations: AtomicU64,
    /// Requests answered from the result cache.
    pub cache_hits: AtomicU64,
    /// `resolve` calls that fell back to the original texture.
    pub degraded_fallbacks: AtomicU64,
    /// Submits or upscales that found the same content already in flight.
    pub dedup_reuses: AtomicU64,
    pub requests_collected: AtomicU64,
    pub requests_failed: AtomicU64,
}

impl CoordinatorMetrics {
    pub const fn new() -> Self {
        Self {
            backend_invocations: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            degraded_fallbacks: AtomicU64::new(0),
            dedup_reuses: AtomicU64::new(0),
            requests_collected: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CoordinatorMetricsSnapshot {
        CoordinatorMetricsSnapshot {
            backend_invocations: self.backend_invocations.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            degraded_fallbacks: self.degraded_fallbacks.load(Ordering::Relaxed),
            dedup_reuses: self.dedup_reuses.load(Ordering::Relaxed),
            requests_collected: self.requests_collected.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }

    pub fn report(&self) {
        let snap = self.snapshot();
        info!(
            backend_invocations = snap.backend_invocations,
            cache_hits = snap.cache_hits,
            degraded = snap.degraded_fallbacks,
            dedup_reuses = snap.dedup_reuses,
            collected = snap.requests_collected,
            failed = snap.requests_failed,
            "Coordinator metrics"
        );
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`CoordinatorMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorMetricsSnapshot {
    pub backend_invocations: u64,
    pub cache_hits: u64,
    pub degraded_fallbacks: u64,
    pub dedup_reuses: u64,
    pub requests_collected: u64,
    pub requests_failed: u64,
}
