// Risk fusion — combines rule, semantic, and behavioral signals into one
// calibrated verdict.
//
// The engine is a pure function of its three signal inputs plus static
// configuration. Deterministic list overrides are applied after the
// weighted computation, so a blacklisted domain can never score below
// HIGH and a whitelisted one with clean behavior can never alert.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::behavior::baseliner::{Anomaly, BehavioralResult};
use crate::event::ActivityEvent;
use crate::knowledge::CategoryAnchor;
use crate::rules::{RuleMatch, RuleOutcome};
use crate::semantic::classifier::SemanticResult;

fn default_rule_weight() -> f64 {
    0.3
}
fn default_semantic_weight() -> f64 {
    0.5
}
fn default_behavior_weight() -> f64 {
    0.2
}
fn default_neutral_rule_component() -> f64 {
    0.3
}
fn default_degraded_multiplier() -> f64 {
    0.7
}
fn default_intent_multiplier() -> f64 {
    1.5
}

/// Configurable fusion coefficients. These are tunables, not invariants:
/// the level thresholds and list overrides live in code, everything here
/// is data from the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionWeights {
    #[serde(default = "default_rule_weight")]
    pub rule: f64,
    #[serde(default = "default_semantic_weight")]
    pub semantic: f64,
    #[serde(default = "default_behavior_weight")]
    pub behavior: f64,
    /// Rule component when no list matched
    #[serde(default = "default_neutral_rule_component")]
    pub neutral_rule_component: f64,
    /// Trust reduction for keyword-fallback semantic results
    #[serde(default = "default_degraded_multiplier")]
    pub degraded_multiplier: f64,
    /// Amplifier for data-egress-capable requests (POST/PUT with payload)
    #[serde(default = "default_intent_multiplier")]
    pub intent_multiplier: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            rule: default_rule_weight(),
            semantic: default_semantic_weight(),
            behavior: default_behavior_weight(),
            neutral_rule_component: default_neutral_rule_component(),
            degraded_multiplier: default_degraded_multiplier(),
            intent_multiplier: default_intent_multiplier(),
        }
    }
}

impl FusionWeights {
    /// Rescale the three signal weights to sum to 1.0, warning if the
    /// configuration was off.
    pub fn normalize(&mut self) {
        let sum = self.rule + self.semantic + self.behavior;
        if sum <= 0.0 {
            warn!("Fusion weights sum to {sum}, resetting to defaults");
            let d = FusionWeights::default();
            self.rule = d.rule;
            self.semantic = d.semantic;
            self.behavior = d.behavior;
            return;
        }
        if (sum - 1.0).abs() > 0.01 {
            warn!("Fusion weights sum to {sum}, normalizing to 1.0");
            self.rule /= sum;
            self.semantic /= sum;
            self.behavior /= sum;
        }
    }
}

/// Discretized risk band. Thresholds are fixed, ordered, non-overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Derive the band from a risk score.
    pub fn from_score(score: u8) -> Self {
        match score {
            s if s >= 90 => RiskLevel::Critical,
            s if s > 70 => RiskLevel::High,
            s if s > 40 => RiskLevel::Medium,
            s if s > 10 => RiskLevel::Low,
            _ => RiskLevel::Safe,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The per-signal breakdown carried inside every verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ContributingSignals {
    pub rule: RuleOutcome,
    pub semantic: SemanticResult,
    pub behavioral: Vec<Anomaly>,
    pub behavioral_unavailable: bool,
}

/// The final, immutable risk assessment for one event.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub event_ref: String,
    pub user_id: String,
    pub domain: String,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
    pub dominant_category: String,
    pub signals: ContributingSignals,
    pub explanation: String,
}

/// Combines the three detection signals plus request intent.
pub struct FusionEngine {
    weights: FusionWeights,
    category_weights: HashMap<String, f64>,
}

impl FusionEngine {
    pub fn new(weights: FusionWeights, anchors: &[CategoryAnchor]) -> Self {
        let category_weights = anchors
            .iter()
            .map(|a| (a.name.clone(), a.weight))
            .collect();
        Self {
            weights,
            category_weights,
        }
    }

    /// Produce the verdict for one event. Pure: identical inputs always
    /// yield identical scores (the caller supplies the opaque event_ref).
    pub fn fuse(
        &self,
        event_ref: String,
        event: &ActivityEvent,
        rule: &RuleMatch,
        semantic: &SemanticResult,
        behavioral: &BehavioralResult,
    ) -> Verdict {
        let rule_component = match rule.outcome {
            RuleOutcome::Blacklist => rule.static_weight,
            RuleOutcome::Whitelist => 0.0,
            RuleOutcome::None => self.weights.neutral_rule_component,
        };

        let category_weight = self
            .category_weights
            .get(&semantic.top_category)
            .copied()
            .unwrap_or(0.0);
        let mut semantic_component = semantic.confidence * category_weight;
        if semantic.degraded {
            semantic_component *= self.weights.degraded_multiplier;
        }

        // Compounding anomalies escalate super-linearly relative to any
        // single one; an unavailable profile store reads as neutral.
        let behavioral_component = if behavioral.unavailable {
            0.5
        } else {
            match behavioral.anomalies.len() {
                0 => 0.0,
                1 => 0.5,
                _ => 1.0,
            }
        };

        let raw = self.weights.rule * rule_component
            + self.weights.semantic * semantic_component
            + self.weights.behavior * behavioral_component;

        let intent = if event.method.is_egress() && event.upload_size_bytes > 0 {
            self.weights.intent_multiplier
        } else {
            1.0
        };

        let mut risk_score = (100.0 * raw * intent).round().clamp(0.0, 100.0) as u8;

        // Deterministic overrides, after the weighted computation.
        match rule.outcome {
            RuleOutcome::Blacklist => risk_score = risk_score.max(90),
            RuleOutcome::Whitelist if behavioral.anomalies.is_empty() => {
                risk_score = risk_score.min(10)
            }
            _ => {}
        }

        let risk_level = RiskLevel::from_score(risk_score);

        let dominant_category = rule
            .category
            .clone()
            .unwrap_or_else(|| semantic.top_category.clone());

        let explanation = explain(event, rule, semantic, behavioral, risk_score, risk_level);

        Verdict {
            event_ref,
            user_id: event.user_id.clone(),
            domain: event.domain.clone(),
            risk_score,
            risk_level,
            dominant_category,
            signals: ContributingSignals {
                rule: rule.outcome,
                semantic: semantic.clone(),
                behavioral: behavioral.anomalies.clone(),
                behavioral_unavailable: behavioral.unavailable,
            },
            explanation,
        }
    }
}

/// Human-readable summary of what fired, for the alert body.
fn explain(
    event: &ActivityEvent,
    rule: &RuleMatch,
    semantic: &SemanticResult,
    behavioral: &BehavioralResult,
    score: u8,
    level: RiskLevel,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    match rule.outcome {
        RuleOutcome::Blacklist => parts.push(format!("Domain {} is blacklisted", event.domain)),
        RuleOutcome::Whitelist => parts.push(format!("Domain {} is whitelisted", event.domain)),
        RuleOutcome::None => {}
    }

    if semantic.confidence > 0.5 {
        let suffix = if semantic.degraded {
            " via keyword fallback"
        } else {
            ""
        };
        parts.push(format!(
            "High similarity to {} ({:.2}{suffix})",
            semantic.top_category, semantic.confidence
        ));
    }

    for anomaly in &behavioral.anomalies {
        parts.push(match anomaly {
            Anomaly::FirstSeenDomain => format!("First time accessing {}", event.domain),
            Anomaly::UploadOutlier => format!(
                "Upload of {} bytes is an outlier for this user",
                event.upload_size_bytes
            ),
            Anomaly::NewCategoryForUser => "New activity category for this user".to_string(),
        });
    }

    if behavioral.unavailable {
        parts.push("Behavioral baseline unavailable".to_string());
    }

    let summary = if parts.is_empty() {
        "Low risk activity".to_string()
    } else {
        parts.join("; ")
    };

    format!("{summary} (Risk: {level}, Score: {score})")
}
