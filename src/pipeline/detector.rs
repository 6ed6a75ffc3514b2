// Detector — runs one event through all three signals and fusion.
//
// This is the per-event core: rule lookup, semantic classification (the
// only suspension point), behavioral baselining against the shard-local
// arena, then fusion. It holds no mutable state of its own, so one
// Detector is shared read-only across every shard.

use std::time::Duration;

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use crate::behavior::arena::ProfileArena;
use crate::behavior::baseliner::{Baseliner, BehavioralResult};
use crate::event::ActivityEvent;
use crate::fusion::{FusionEngine, Verdict};
use crate::knowledge::KnowledgeBase;
use crate::rules::RuleSet;
use crate::semantic::classifier::SemanticClassifier;
use crate::semantic::traits::Embedder;

pub struct Detector {
    rules: RuleSet,
    classifier: SemanticClassifier,
    baseliner: Baseliner,
    fusion: FusionEngine,
}

impl Detector {
    /// Assemble a detector from the knowledge base and an optional
    /// embedding capability.
    pub fn from_knowledge(
        kb: &KnowledgeBase,
        embedder: Option<Box<dyn Embedder>>,
        embedding_timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            rules: RuleSet::from_knowledge(kb)?,
            classifier: SemanticClassifier::new(kb.anchors.clone(), embedder, embedding_timeout),
            baseliner: Baseliner::new(kb.anomaly_k),
            fusion: FusionEngine::new(kb.fusion.clone(), &kb.anchors),
        })
    }

    /// Evaluate one event against all signals and fuse the verdict.
    ///
    /// The behavioral step runs last and its profile mutation is the final
    /// atomic action, so cancellation before this call returns leaves the
    /// arena untouched. Every accepted event yields exactly one verdict.
    pub async fn evaluate(&self, event: &ActivityEvent, arena: &mut ProfileArena) -> Verdict {
        let rule = self.rules.match_domain(&event.domain, &event.path);
        let semantic = self.classifier.classify(&event.domain, &event.path).await;

        // The baseliner keys its category statistics on the event's
        // dominant category: the rule category when a list matched,
        // otherwise the semantic top-1.
        let dominant = rule
            .category
            .as_deref()
            .unwrap_or(&semantic.top_category)
            .to_string();

        let behavioral = if arena.enabled() {
            let profile = arena.entry(&event.user_id, event.timestamp);
            self.baseliner.observe(profile, event, &dominant)
        } else {
            BehavioralResult::unavailable()
        };

        let verdict = self.fusion.fuse(
            Uuid::new_v4().to_string(),
            event,
            &rule,
            &semantic,
            &behavioral,
        );

        info!(
            user = event.user_id,
            domain = event.domain,
            score = verdict.risk_score,
            level = verdict.risk_level.as_str(),
            category = verdict.dominant_category,
            degraded = verdict.signals.semantic.degraded,
            "Scored event"
        );

        verdict
    }
}
