// Shard pool — single-writer-per-user concurrency.
//
// hash(user_id) % shard_count routes every event for a given user to the
// same shard task, which owns that shard's profile arena outright. The
// per-shard channels are bounded: when the pool is saturated, submit()
// waits, pushing backpressure to the consumption boundary instead of
// buffering unboundedly or dropping events.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::detector::Detector;
use super::stats::{EngineStats, StatsSnapshot};
use crate::behavior::arena::ProfileArena;
use crate::dispatch::Dispatcher;
use crate::event::ActivityEvent;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub shard_count: usize,
    pub queue_depth: usize,
    pub max_profiles_per_shard: usize,
    /// Minimum risk score counted as an alert
    pub alert_threshold: u8,
}

pub struct Pipeline {
    senders: Vec<mpsc::Sender<ActivityEvent>>,
    handles: Vec<JoinHandle<()>>,
    stats: Arc<EngineStats>,
}

impl Pipeline {
    /// Spawn the shard tasks. The detector is shared read-only; each shard
    /// owns its arena exclusively.
    pub fn spawn(
        detector: Arc<Detector>,
        dispatcher: Arc<dyn Dispatcher>,
        opts: PipelineOptions,
    ) -> Self {
        let stats = Arc::new(EngineStats::default());
        let mut senders = Vec::with_capacity(opts.shard_count);
        let mut handles = Vec::with_capacity(opts.shard_count);

        for shard_id in 0..opts.shard_count {
            let (tx, rx) = mpsc::channel(opts.queue_depth);
            senders.push(tx);
            handles.push(tokio::spawn(shard_loop(
                shard_id,
                rx,
                Arc::clone(&detector),
                Arc::clone(&dispatcher),
                Arc::clone(&stats),
                opts,
            )));
        }

        Self {
            senders,
            handles,
            stats,
        }
    }

    /// Route an event to its user's shard. Waits when the shard's queue
    /// is full: admission control happens here, not inside fusion.
    pub async fn submit(&self, event: ActivityEvent) -> Result<()> {
        let shard = shard_for(&event.user_id, self.senders.len());
        self.senders[shard]
            .send(event)
            .await
            .map_err(|_| anyhow::anyhow!("Pipeline is shut down"))
    }

    /// Shared counters (the caller owns the rejection count).
    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    /// Close the intake, drain every shard, and return the final counters.
    pub async fn shutdown(self) -> StatsSnapshot {
        drop(self.senders);
        join_all(self.handles).await;
        self.stats.snapshot()
    }
}

/// Stable user → shard routing.
fn shard_for(user_id: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    user_id.hash(&mut hasher);
    (hasher.finish() % shard_count as u64) as usize
}

async fn shard_loop(
    shard_id: usize,
    mut rx: mpsc::Receiver<ActivityEvent>,
    detector: Arc<Detector>,
    dispatcher: Arc<dyn Dispatcher>,
    stats: Arc<EngineStats>,
    opts: PipelineOptions,
) {
    let mut arena = ProfileArena::new(opts.max_profiles_per_shard);

    while let Some(event) = rx.recv().await {
        let verdict = detector.evaluate(&event, &mut arena).await;

        stats.record_processed();
        if verdict.signals.semantic.degraded {
            stats.record_degraded();
        }
        if verdict.risk_score >= opts.alert_threshold {
            stats.record_alert();
        }

        // A failed hand-off is operationally visible but never fails the
        // event; the verdict itself was produced and counted.
        if let Err(e) = dispatcher.dispatch(&verdict).await {
            warn!(
                error = %e,
                event_ref = verdict.event_ref,
                "Dispatcher failed for verdict"
            );
        }
    }

    debug!(shard_id, profiles = arena.len(), "Shard drained");
}
