// End-to-end detection scenarios.
//
// These tests exercise the full signal chain — normalize -> rules ->
// semantic -> baseline -> fusion — with in-code knowledge bases and test
// embedders. No network calls, no filesystem.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use shadowguard::behavior::arena::ProfileArena;
use shadowguard::event::normalize::{normalize, RawRecord};
use shadowguard::event::ActivityEvent;
use shadowguard::fusion::RiskLevel;
use shadowguard::knowledge::{CategoryAnchor, KnowledgeBase, ListEntry};
use shadowguard::pipeline::Detector;
use shadowguard::rules::RuleOutcome;
use shadowguard::semantic::traits::Embedder;

fn knowledge() -> KnowledgeBase {
    let mut kb = KnowledgeBase {
        anchors: vec![
            CategoryAnchor {
                name: "generative-ai".to_string(),
                weight: 0.85,
                embedding: vec![1.0, 0.0, 0.0],
                keywords: vec!["gpt".to_string(), "chat".to_string(), "ai".to_string()],
            },
            CategoryAnchor {
                name: "file-sharing".to_string(),
                weight: 0.7,
                embedding: vec![0.0, 1.0, 0.0],
                keywords: vec!["drive".to_string(), "share".to_string(), "mega".to_string()],
            },
            CategoryAnchor {
                name: "safe-saas".to_string(),
                weight: 0.1,
                embedding: vec![0.0, 0.0, 1.0],
                keywords: vec!["wiki".to_string(), "docs".to_string()],
            },
        ],
        blacklist: vec![ListEntry {
            domain: "mega.nz".to_string(),
            category: "file-sharing".to_string(),
            weight: 0.9,
        }],
        blacklist_patterns: vec![],
        whitelist: vec![ListEntry {
            domain: "internal-wiki.company.com".to_string(),
            category: "internal".to_string(),
            weight: 0.0,
        }],
        fusion: Default::default(),
        anomaly_k: 3.0,
    };
    kb.validate().unwrap();
    kb
}

struct FixedEmbedder(Vec<f64>);

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f64>> {
        Ok(self.0.clone())
    }
}

/// Never answers within any realistic budget.
struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f64>> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(vec![1.0, 0.0, 0.0])
    }
}

fn detector(embedder: Option<Box<dyn Embedder>>) -> Detector {
    Detector::from_knowledge(&knowledge(), embedder, Duration::from_secs(2)).unwrap()
}

fn event(user: &str, domain: &str, method: &str, upload: i64, minute: u32) -> ActivityEvent {
    let raw = RawRecord {
        ts: Some(format!("2025-12-12T14:{minute:02}:00Z")),
        user_id: Some(user.to_string()),
        domain: Some(domain.to_string()),
        url: Some("/".to_string()),
        method: Some(method.to_string()),
        upload_size_bytes: Some(upload),
        kind: None,
    };
    normalize(&raw).unwrap()
}

// ============================================================
// Scenario A: first-time upload to a high-confidence AI domain
// ============================================================

#[tokio::test]
async fn scenario_a_ai_upload_first_contact_is_high_or_critical() {
    let detector = detector(Some(Box::new(FixedEmbedder(vec![0.98, 0.1, 0.0]))));
    let mut arena = ProfileArena::new(100);

    let verdict = detector
        .evaluate(
            &event("alice@company.com", "chatgpt.com", "POST", 500_000, 30),
            &mut arena,
        )
        .await;

    assert!(
        matches!(verdict.risk_level, RiskLevel::High | RiskLevel::Critical),
        "expected HIGH or CRITICAL, got {} (score {})",
        verdict.risk_level,
        verdict.risk_score
    );
    assert_eq!(verdict.dominant_category, "generative-ai");
    assert!(!verdict.signals.semantic.degraded);
    assert!(!verdict.signals.behavioral.is_empty());
}

// ============================================================
// Scenario B: whitelisted internal tool, familiar to the user
// ============================================================

#[tokio::test]
async fn scenario_b_familiar_whitelisted_domain_is_safe() {
    let detector = detector(Some(Box::new(FixedEmbedder(vec![0.0, 0.0, 1.0]))));
    let mut arena = ProfileArena::new(100);

    // Build familiarity: several prior visits establish the domain and
    // its category in the profile.
    for minute in 0..3 {
        detector
            .evaluate(
                &event("bob@company.com", "internal-wiki.company.com", "GET", 0, minute),
                &mut arena,
            )
            .await;
    }

    let verdict = detector
        .evaluate(
            &event("bob@company.com", "internal-wiki.company.com", "GET", 0, 10),
            &mut arena,
        )
        .await;

    assert_eq!(verdict.risk_level, RiskLevel::Safe, "score {}", verdict.risk_score);
    assert_eq!(verdict.signals.rule, RuleOutcome::Whitelist);
    assert!(verdict.signals.behavioral.is_empty());
}

// ============================================================
// Scenario C: blacklisted domain, independent of semantics
// ============================================================

#[tokio::test]
async fn scenario_c_blacklisted_domain_is_critical() {
    // Embedder deliberately points at the benign anchor: the blacklist
    // override must not care.
    let detector = detector(Some(Box::new(FixedEmbedder(vec![0.0, 0.0, 1.0]))));
    let mut arena = ProfileArena::new(100);

    let verdict = detector
        .evaluate(&event("carol@company.com", "mega.nz", "GET", 0, 30), &mut arena)
        .await;

    assert_eq!(verdict.risk_level, RiskLevel::Critical);
    assert_eq!(verdict.signals.rule, RuleOutcome::Blacklist);
    assert!(verdict.risk_score >= 90);
    assert_eq!(verdict.dominant_category, "file-sharing");
}

#[tokio::test]
async fn blacklist_subdomain_inherits_the_override() {
    let detector = detector(None);
    let mut arena = ProfileArena::new(100);

    let verdict = detector
        .evaluate(
            &event("carol@company.com", "files.mega.nz", "GET", 0, 30),
            &mut arena,
        )
        .await;

    assert!(matches!(
        verdict.risk_level,
        RiskLevel::High | RiskLevel::Critical
    ));
    assert_eq!(verdict.signals.rule, RuleOutcome::Blacklist);
}

// ============================================================
// Scenario D: embedding capability timeout -> degraded verdict
// ============================================================

#[tokio::test(start_paused = true)]
async fn scenario_d_embedding_timeout_degrades_but_still_verdicts() {
    let detector = detector(Some(Box::new(SlowEmbedder)));
    let mut arena = ProfileArena::new(100);

    let verdict = detector
        .evaluate(
            &event("dave@company.com", "chatgpt.com", "POST", 100_000, 30),
            &mut arena,
        )
        .await;

    // The verdict exists, the semantic signal is flagged degraded, and
    // the keyword fallback still categorized the domain.
    assert!(verdict.signals.semantic.degraded);
    assert_eq!(verdict.signals.semantic.top_category, "generative-ai");
    assert!(verdict.signals.semantic.confidence > 0.0);
}

// ============================================================
// Cross-signal invariants
// ============================================================

#[tokio::test]
async fn whitelist_with_upload_outlier_is_not_suppressed() {
    let detector = detector(Some(Box::new(FixedEmbedder(vec![0.0, 0.0, 1.0]))));
    let mut arena = ProfileArena::new(100);

    // Baseline: small steady uploads to the whitelisted wiki.
    for (minute, upload) in [(0, 1000i64), (1, 1200), (2, 900), (3, 1100)] {
        detector
            .evaluate(
                &event(
                    "erin@company.com",
                    "internal-wiki.company.com",
                    "POST",
                    upload,
                    minute as u32,
                ),
                &mut arena,
            )
            .await;
    }

    // A 200MB push to the same whitelisted domain: the anomaly lifts the
    // whitelist cap.
    let verdict = detector
        .evaluate(
            &event(
                "erin@company.com",
                "internal-wiki.company.com",
                "POST",
                200_000_000,
                30,
            ),
            &mut arena,
        )
        .await;

    assert!(verdict
        .signals
        .behavioral
        .iter()
        .any(|a| a.as_str() == "upload_outlier"));
    assert!(
        verdict.risk_score > 10,
        "anomaly must lift the whitelist cap, got {}",
        verdict.risk_score
    );
}

#[tokio::test]
async fn degraded_classification_scores_below_crisp_classification() {
    let mut arena_a = ProfileArena::new(100);
    let mut arena_b = ProfileArena::new(100);

    let crisp = detector(Some(Box::new(FixedEmbedder(vec![1.0, 0.0, 0.0]))));
    let degraded = detector(None);

    let a = crisp
        .evaluate(&event("u", "chatgpt.com", "POST", 9000, 30), &mut arena_a)
        .await;
    let b = degraded
        .evaluate(&event("u", "chatgpt.com", "POST", 9000, 30), &mut arena_b)
        .await;

    assert!(!a.signals.semantic.degraded);
    assert!(b.signals.semantic.degraded);
    assert!(b.risk_score < a.risk_score);
}

#[tokio::test]
async fn disabled_profile_store_flags_behavioral_unavailable() {
    let detector = detector(None);
    // Cap 0 disables behavioral tracking entirely.
    let mut arena = ProfileArena::new(0);

    let verdict = detector
        .evaluate(&event("frank@company.com", "example.org", "GET", 0, 30), &mut arena)
        .await;

    assert!(verdict.signals.behavioral_unavailable);
    assert!(verdict.signals.behavioral.is_empty());
    assert!(verdict.explanation.contains("unavailable"));
}
