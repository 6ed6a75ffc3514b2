// Engine counters for operational visibility.
//
// Rejections are counted at the consumption boundary (the caller of the
// normalizer), everything else inside the shards; all counters are shared
// through one EngineStats handle.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct EngineStats {
    processed: AtomicU64,
    rejected: AtomicU64,
    alerts: AtomicU64,
    degraded: AtomicU64,
}

impl EngineStats {
    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_alert(&self) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_degraded(&self) {
        self.degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy)]
pub struct StatsSnapshot {
    pub processed: u64,
    pub rejected: u64,
    pub alerts: u64,
    pub degraded: u64,
}
