// Pipeline tests — shard routing, per-user ordering, and the
// one-verdict-per-event guarantee.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use shadowguard::dispatch::Dispatcher;
use shadowguard::event::normalize::{normalize, RawRecord};
use shadowguard::event::ActivityEvent;
use shadowguard::fusion::Verdict;
use shadowguard::knowledge::{CategoryAnchor, KnowledgeBase, ListEntry};
use shadowguard::pipeline::{Detector, Pipeline, PipelineOptions};

fn knowledge() -> KnowledgeBase {
    let mut kb = KnowledgeBase {
        anchors: vec![CategoryAnchor {
            name: "generative-ai".to_string(),
            weight: 0.85,
            embedding: vec![1.0, 0.0],
            keywords: vec!["gpt".to_string(), "chat".to_string(), "ai".to_string()],
        }],
        blacklist: vec![ListEntry {
            domain: "mega.nz".to_string(),
            category: "file-sharing".to_string(),
            weight: 0.9,
        }],
        blacklist_patterns: vec![],
        whitelist: vec![],
        fusion: Default::default(),
        anomaly_k: 3.0,
    };
    kb.validate().unwrap();
    kb
}

/// Collects every dispatched verdict for post-run assertions.
#[derive(Default)]
struct CollectingDispatcher {
    verdicts: Mutex<Vec<Verdict>>,
}

#[async_trait]
impl Dispatcher for CollectingDispatcher {
    async fn dispatch(&self, verdict: &Verdict) -> Result<()> {
        self.verdicts.lock().unwrap().push(verdict.clone());
        Ok(())
    }
}

fn event(user: &str, domain: &str, minute: u32) -> ActivityEvent {
    let raw = RawRecord {
        ts: Some(format!("2025-12-12T09:{minute:02}:00Z")),
        user_id: Some(user.to_string()),
        domain: Some(domain.to_string()),
        url: Some("/".to_string()),
        method: Some("GET".to_string()),
        upload_size_bytes: Some(0),
        kind: None,
    };
    normalize(&raw).unwrap()
}

fn spawn_pipeline(sink: Arc<CollectingDispatcher>) -> Pipeline {
    let detector = Arc::new(
        Detector::from_knowledge(&knowledge(), None, Duration::from_millis(100)).unwrap(),
    );
    Pipeline::spawn(
        detector,
        sink,
        PipelineOptions {
            shard_count: 4,
            queue_depth: 16,
            max_profiles_per_shard: 100,
            alert_threshold: 70,
        },
    )
}

#[tokio::test]
async fn every_event_yields_exactly_one_verdict() {
    let sink = Arc::new(CollectingDispatcher::default());
    let pipeline = spawn_pipeline(Arc::clone(&sink));

    let users = ["alice", "bob", "carol", "dave", "erin"];
    let mut submitted = 0;
    for round in 0..4u32 {
        for user in users {
            pipeline
                .submit(event(user, "example.org", round))
                .await
                .unwrap();
            submitted += 1;
        }
    }

    let stats = pipeline.shutdown().await;
    assert_eq!(stats.processed, submitted);
    assert_eq!(sink.verdicts.lock().unwrap().len(), submitted as usize);
}

#[tokio::test]
async fn same_user_events_are_processed_in_order() {
    let sink = Arc::new(CollectingDispatcher::default());
    let pipeline = spawn_pipeline(Arc::clone(&sink));

    // First contact with each domain, then a repeat of the first.
    pipeline.submit(event("alice", "one.example", 0)).await.unwrap();
    pipeline.submit(event("alice", "two.example", 1)).await.unwrap();
    pipeline.submit(event("alice", "one.example", 2)).await.unwrap();
    pipeline.shutdown().await;

    let verdicts = sink.verdicts.lock().unwrap();
    let alice: Vec<&Verdict> = verdicts.iter().filter(|v| v.user_id == "alice").collect();
    assert_eq!(alice.len(), 3);

    let first_seen =
        |v: &Verdict| v.signals.behavioral.iter().any(|a| a.as_str() == "first_seen_domain");

    // In arrival order the two new domains flag first contact; the repeat
    // must not, which also proves the first event's profile update landed
    // before the third was evaluated.
    assert!(first_seen(alice[0]));
    assert!(first_seen(alice[1]));
    assert!(!first_seen(alice[2]));
}

#[tokio::test]
async fn users_are_isolated_across_profiles() {
    let sink = Arc::new(CollectingDispatcher::default());
    let pipeline = spawn_pipeline(Arc::clone(&sink));

    pipeline.submit(event("alice", "shared.example", 0)).await.unwrap();
    pipeline.submit(event("bob", "shared.example", 1)).await.unwrap();
    pipeline.shutdown().await;

    let verdicts = sink.verdicts.lock().unwrap();
    // Bob has never seen the domain, no matter what Alice did.
    for v in verdicts.iter() {
        assert!(
            v.signals.behavioral.iter().any(|a| a.as_str() == "first_seen_domain"),
            "user {} should be first-contact",
            v.user_id
        );
    }
}

#[tokio::test]
async fn blacklisted_events_count_as_alerts() {
    let sink = Arc::new(CollectingDispatcher::default());
    let pipeline = spawn_pipeline(Arc::clone(&sink));

    pipeline.submit(event("alice", "mega.nz", 0)).await.unwrap();
    pipeline.submit(event("alice", "example.org", 1)).await.unwrap();
    let stats = pipeline.shutdown().await;

    assert_eq!(stats.processed, 2);
    assert_eq!(stats.alerts, 1);
}

#[tokio::test]
async fn shutdown_with_no_events_drains_cleanly() {
    let sink = Arc::new(CollectingDispatcher::default());
    let pipeline = spawn_pipeline(Arc::clone(&sink));

    let stats = pipeline.shutdown().await;
    assert_eq!(stats.processed, 0);
    assert!(sink.verdicts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn heartbeat_events_flow_through_unchanged() {
    let sink = Arc::new(CollectingDispatcher::default());
    let pipeline = spawn_pipeline(Arc::clone(&sink));

    let raw = RawRecord {
        ts: Some("2025-12-12T09:00:00Z".to_string()),
        user_id: Some("alice".to_string()),
        domain: Some("example.org".to_string()),
        url: None,
        method: None,
        upload_size_bytes: None,
        kind: Some("heartbeat".to_string()),
    };
    pipeline.submit(normalize(&raw).unwrap()).await.unwrap();
    let stats = pipeline.shutdown().await;

    assert_eq!(stats.processed, 1);
    assert_eq!(sink.verdicts.lock().unwrap().len(), 1);
}
