use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::util::millis_u64;

/// Point-in-time view of gate activity.
#[derive(Clone, Debug)]
pub struct GateMetricsSnapshot {
    /// Requests admitted, with or without a wait.
    pub admitted: u64,
    /// Requests admitted only after a bounded wait.
    pub delayed: u64,
    /// Requests rejected because the required wait exceeded the threshold.
    pub rejected: u64,
    /// Waits aborted by external cancellation.
    pub cancelled: u64,
    /// Snapshots stored from response headers.
    pub state_updates: u64,
    /// Entries removed by expiry sweeps.
    pub evictions: u64,
    pub wait_total_ms: u64,
    pub wait_samples: u64,
    pub wait_avg_ms: f64,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct GateMetrics {
    inner: Arc<GateMetricsInner>,
}

#[derive(Debug, Default)]
struct GateMetricsInner {
    admitted: AtomicU64,
    delayed: AtomicU64,
    rejected: AtomicU64,
    cancelled: AtomicU64,
    state_updates: AtomicU64,
    evictions: AtomicU64,
    wait_total_ms: AtomicU64,
    wait_samples: AtomicU64,
}

impl GateMetrics {
    pub(crate) fn record_admitted(&self) {
        self.inner.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delayed(&self, wait: Duration) {
        self.inner.delayed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .wait_total_ms
            .fetch_add(millis_u64(wait), Ordering::Relaxed);
        self.inner.wait_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.inner.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancelled(&self) {
        self.inner.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_state_update(&self) {
        self.inner.state_updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, removed: usize) {
        if removed > 0 {
            self.inner
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self) -> GateMetricsSnapshot {
        let wait_total_ms = self.inner.wait_total_ms.load(Ordering::Relaxed);
        let wait_samples = self.inner.wait_samples.load(Ordering::Relaxed);
        let wait_avg_ms = if wait_samples == 0 {
            0.0
        } else {
            wait_total_ms as f64 / wait_samples as f64
        };

        GateMetricsSnapshot {
            admitted: self.inner.admitted.load(Ordering::Relaxed),
            delayed: self.inner.delayed.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            cancelled: self.inner.cancelled.load(Ordering::Relaxed),
            state_updates: self.inner.state_updates.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            wait_total_ms,
            wait_samples,
            wait_avg_ms,
        }
    }
}
