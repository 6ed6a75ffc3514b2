// Verdict dispatch — hands finished verdicts to the alerting collaborator.
//
// The Dispatcher trait is the engine's outward-facing seam. Every verdict
// is dispatched exactly once; a dispatch failure is logged by the pipeline
// and never fails the event.

pub mod webhook;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::fusion::Verdict;
use crate::output::terminal;

/// Receives every verdict the engine produces.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, verdict: &Verdict) -> Result<()>;
}

/// Discards verdicts. Used when the engine runs purely for its logs.
pub struct NoopDispatcher;

#[async_trait]
impl Dispatcher for NoopDispatcher {
    async fn dispatch(&self, _verdict: &Verdict) -> Result<()> {
        Ok(())
    }
}

/// Renders each verdict as a colored terminal line.
pub struct TerminalDispatcher {
    /// Emit raw JSON lines instead of the human-readable rendering
    pub json: bool,
}

#[async_trait]
impl Dispatcher for TerminalDispatcher {
    async fn dispatch(&self, verdict: &Verdict) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(verdict)?);
        } else {
            terminal::display_verdict_line(verdict);
        }
        Ok(())
    }
}

/// Fans a verdict out to several dispatchers. Individual failures are
/// logged and do not stop the remaining targets.
pub struct MultiDispatcher {
    targets: Vec<Arc<dyn Dispatcher>>,
}

impl MultiDispatcher {
    pub fn new(targets: Vec<Arc<dyn Dispatcher>>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl Dispatcher for MultiDispatcher {
    async fn dispatch(&self, verdict: &Verdict) -> Result<()> {
        for target in &self.targets {
            if let Err(e) = target.dispatch(verdict).await {
                warn!(error = %e, event_ref = verdict.event_ref, "Dispatch target failed");
            }
        }
        Ok(())
    }
}
