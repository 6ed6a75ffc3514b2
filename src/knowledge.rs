// Knowledge base — the externally supplied detection data.
//
// Anchors, blacklist, whitelist, fusion weights, and the anomaly threshold
// are all data, never code: swapping the file changes detection behavior
// without redeploying the engine. Loaded once at startup; read-only during
// operation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fusion::FusionWeights;

/// A named risk category with a static weight, a reference embedding
/// vector for semantic comparison, and a keyword set for degraded mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAnchor {
    pub name: String,
    /// Static risk weight of the category, 0.0 (benign) to 1.0 (critical)
    pub weight: f64,
    /// Precomputed embedding vector; all anchors must share one dimension
    pub embedding: Vec<f64>,
    /// Substring fallback set used when the embedding capability is down
    pub keywords: Vec<String>,
}

/// A blacklist or whitelist entry: a domain tagged with a category and
/// a static weight. Matches exactly or as a suffix (`mega.nz` also
/// covers `www.mega.nz`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEntry {
    pub domain: String,
    pub category: String,
    #[serde(default)]
    pub weight: f64,
}

/// A regex blacklist entry for domain families that can't be enumerated
/// (e.g. `stealth-.*\.io`). Pattern hits are blacklist hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub weight: f64,
}

fn default_anomaly_k() -> f64 {
    3.0
}

/// The full knowledge base as loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub anchors: Vec<CategoryAnchor>,
    #[serde(default)]
    pub blacklist: Vec<ListEntry>,
    #[serde(default)]
    pub blacklist_patterns: Vec<PatternEntry>,
    #[serde(default)]
    pub whitelist: Vec<ListEntry>,
    #[serde(default)]
    pub fusion: FusionWeights,
    /// Upload-outlier threshold: flag when size > mean + k * stddev
    #[serde(default = "default_anomaly_k")]
    pub anomaly_k: f64,
}

impl KnowledgeBase {
    /// Load and validate a knowledge base from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read knowledge base: {}", path.display()))?;
        let mut kb: KnowledgeBase = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid knowledge base JSON: {}", path.display()))?;
        kb.validate()?;
        Ok(kb)
    }

    /// Validate invariants and normalize what can be normalized.
    ///
    /// Hard errors: no anchors, inconsistent embedding dimensions, weights
    /// outside [0,1]. Soft (warned, then fixed): fusion weights not summing
    /// to 1.0, a domain present in both lists.
    pub fn validate(&mut self) -> Result<()> {
        if self.anchors.is_empty() {
            anyhow::bail!("Knowledge base has no category anchors");
        }

        let dim = self.anchors[0].embedding.len();
        for anchor in &self.anchors {
            if anchor.embedding.len() != dim {
                anyhow::bail!(
                    "Anchor '{}' has embedding dimension {} but '{}' has {}",
                    anchor.name,
                    anchor.embedding.len(),
                    self.anchors[0].name,
                    dim
                );
            }
            if !(0.0..=1.0).contains(&anchor.weight) {
                anyhow::bail!(
                    "Anchor '{}' weight {} is outside [0.0, 1.0]",
                    anchor.name,
                    anchor.weight
                );
            }
        }

        self.fusion.normalize();

        // A domain on both lists is a misconfiguration; blacklist wins at
        // match time, but surface it once here for operational visibility.
        for black in &self.blacklist {
            if self
                .whitelist
                .iter()
                .any(|white| white.domain.eq_ignore_ascii_case(&black.domain))
            {
                warn!(
                    domain = black.domain,
                    "Domain appears in both blacklist and whitelist; blacklist takes precedence"
                );
            }
        }

        Ok(())
    }

    /// The shared embedding dimension of the anchors.
    pub fn embedding_dim(&self) -> usize {
        self.anchors.first().map_or(0, |a| a.embedding.len())
    }
}
