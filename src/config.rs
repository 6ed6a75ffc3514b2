use std::env;

use anyhow::Result;

/// Central configuration loaded from environment variables.
///
/// Runtime knobs live here; the detection *data* (anchors, lists, fusion
/// weights, anomaly threshold) lives in the knowledge base file so it can
/// be swapped without touching the environment. The .env file is loaded
/// automatically at startup via dotenvy.
pub struct Config {
    /// Path to the knowledge base JSON (anchors, lists, weights)
    pub knowledge_path: String,
    /// Embedding provider endpoint. When unset, the semantic classifier
    /// runs permanently in keyword-fallback mode.
    pub embedding_url: Option<String>,
    /// Bearer token for the embedding provider (may be empty)
    pub embedding_api_key: String,
    /// Budget for a single embedding call before falling back to keywords
    pub embedding_timeout_ms: u64,
    /// Alert webhook endpoint. When unset, verdicts are only logged locally.
    pub webhook_url: Option<String>,
    /// Minimum risk score (0-100) that triggers webhook delivery
    pub alert_threshold: u8,
    /// Number of single-writer shards for per-user behavioral state
    pub shard_count: usize,
    /// Bounded capacity of each shard's event queue (backpressure knob)
    pub shard_queue_depth: usize,
    /// Per-shard cap on retained user profiles; 0 disables behavioral
    /// tracking entirely (verdicts carry behavioral_unavailable)
    pub max_profiles_per_shard: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the embedding and webhook endpoints,
    /// which are genuinely optional capabilities.
    pub fn load() -> Result<Self> {
        Ok(Self {
            knowledge_path: env::var("SHADOWGUARD_KNOWLEDGE")
                .unwrap_or_else(|_| "./knowledge.json".to_string()),
            embedding_url: env::var("EMBEDDING_URL").ok().filter(|s| !s.is_empty()),
            embedding_api_key: env::var("EMBEDDING_API_KEY").unwrap_or_default(),
            embedding_timeout_ms: parse_env("EMBEDDING_TIMEOUT_MS", 2000)?,
            webhook_url: env::var("ALERT_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
            alert_threshold: parse_env("SHADOWGUARD_ALERT_THRESHOLD", 70)?,
            shard_count: parse_env("SHADOWGUARD_SHARDS", 8)?,
            shard_queue_depth: parse_env("SHADOWGUARD_QUEUE_DEPTH", 256)?,
            max_profiles_per_shard: parse_env("SHADOWGUARD_MAX_PROFILES", 10_000)?,
        })
    }

    /// Check that the shard layout is usable.
    /// Call this before spawning the pipeline.
    pub fn require_shards(&self) -> Result<()> {
        if self.shard_count == 0 {
            anyhow::bail!("SHADOWGUARD_SHARDS must be at least 1");
        }
        if self.shard_queue_depth == 0 {
            anyhow::bail!("SHADOWGUARD_QUEUE_DEPTH must be at least 1");
        }
        Ok(())
    }
}

/// Parse an env var into any FromStr type, with a default when unset.
/// A set-but-unparseable value is an error, not a silent fallback.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} is set but not a valid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}
