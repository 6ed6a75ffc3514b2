// Semantic classifier — top-1 anchor similarity with bounded degradation.
//
// The only component that performs blocking external I/O. The embedding
// call runs under an explicit timeout; on expiry or error the call is
// abandoned in favor of keyword matching against each anchor's fallback
// set, and the result is flagged degraded. The pipeline never waits past
// the timeout budget.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::cosine_similarity;
use super::traits::Embedder;
use crate::knowledge::CategoryAnchor;

/// Confidence ceiling for keyword-fallback results. Substring hits are a
/// much weaker signal than embedding similarity.
const KEYWORD_CONFIDENCE_CEILING: f64 = 0.6;

/// The classifier's output for one event.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticResult {
    pub top_category: String,
    /// Similarity (or fallback keyword density) in [0, 1]
    pub confidence: f64,
    /// True when keyword fallback produced this result
    pub degraded: bool,
}

impl SemanticResult {
    /// Result when no anchor matched at all.
    fn unknown(degraded: bool) -> Self {
        Self {
            top_category: "unknown".to_string(),
            confidence: 0.0,
            degraded,
        }
    }
}

/// Classifies a domain against the anchor set.
pub struct SemanticClassifier {
    anchors: Vec<CategoryAnchor>,
    embedder: Option<Box<dyn Embedder>>,
    timeout: Duration,
}

impl SemanticClassifier {
    /// Build a classifier. `embedder: None` means the embedding capability
    /// is not deployed; every result will be a degraded keyword match.
    pub fn new(
        anchors: Vec<CategoryAnchor>,
        embedder: Option<Box<dyn Embedder>>,
        timeout: Duration,
    ) -> Self {
        Self {
            anchors,
            embedder,
            timeout,
        }
    }

    /// Classify one domain (plus its request path for extra context).
    ///
    /// Embedding path: embed the descriptor, cosine against every anchor,
    /// take the top-1. Fallback path: keyword density per anchor, capped
    /// confidence, `degraded = true`. Never suspends past the timeout.
    pub async fn classify(&self, domain: &str, path: &str) -> SemanticResult {
        let text = descriptor(domain, path);

        let Some(embedder) = &self.embedder else {
            return self.classify_keywords(&text);
        };

        match tokio::time::timeout(self.timeout, embedder.embed(&text)).await {
            Ok(Ok(vector)) => {
                if vector.len() != self.anchor_dim() {
                    warn!(
                        got = vector.len(),
                        expected = self.anchor_dim(),
                        "Embedding dimension mismatch, using keyword fallback"
                    );
                    return self.classify_keywords(&text);
                }
                self.classify_embedded(&vector)
            }
            Ok(Err(e)) => {
                warn!(error = %e, domain, "Embedding call failed, using keyword fallback");
                self.classify_keywords(&text)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    domain, "Embedding call timed out, using keyword fallback"
                );
                self.classify_keywords(&text)
            }
        }
    }

    fn anchor_dim(&self) -> usize {
        self.anchors.first().map_or(0, |a| a.embedding.len())
    }

    fn classify_embedded(&self, query: &[f64]) -> SemanticResult {
        let best = self
            .anchors
            .iter()
            .map(|anchor| (anchor, cosine_similarity(query, &anchor.embedding)))
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((anchor, similarity)) => {
                debug!(
                    category = anchor.name,
                    similarity = format!("{similarity:.3}"),
                    "Semantic top-1"
                );
                SemanticResult {
                    top_category: anchor.name.clone(),
                    confidence: similarity,
                    degraded: false,
                }
            }
            None => SemanticResult::unknown(false),
        }
    }

    /// Keyword fallback: fraction of an anchor's keywords appearing as
    /// substrings of the descriptor, capped well below embedding-grade
    /// confidence.
    fn classify_keywords(&self, text: &str) -> SemanticResult {
        let lower = text.to_ascii_lowercase();

        let best = self
            .anchors
            .iter()
            .filter(|anchor| !anchor.keywords.is_empty())
            .map(|anchor| {
                let hits = anchor
                    .keywords
                    .iter()
                    .filter(|kw| lower.contains(kw.to_ascii_lowercase().as_str()))
                    .count();
                let density = hits as f64 / anchor.keywords.len() as f64;
                (anchor, density.min(1.0) * KEYWORD_CONFIDENCE_CEILING)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));

        match best {
            Some((anchor, confidence)) if confidence > 0.0 => SemanticResult {
                top_category: anchor.name.clone(),
                confidence,
                degraded: true,
            },
            _ => SemanticResult::unknown(true),
        }
    }
}

/// Expand a bare hostname into a descriptor the embedding model can work
/// with. Strips the TLD noise, then appends context hints for recognizable
/// service families; interesting path segments ride along.
pub fn descriptor(domain: &str, path: &str) -> String {
    let stem = domain
        .trim_end_matches(".com")
        .trim_end_matches(".io")
        .trim_end_matches(".org")
        .trim_end_matches(".net");
    let mut text = stem.replace(['-', '.'], " ");

    let lower = text.to_ascii_lowercase();
    if ["chat", "gpt", "ai", "llm"].iter().any(|k| lower.contains(k)) {
        text.push_str(" artificial intelligence chat assistant");
    } else if lower.contains("git") {
        text.push_str(" code repository development");
    } else if lower.contains("slack") || lower.contains("teams") {
        text.push_str(" team communication messaging");
    } else if ["drive", "dropbox", "box", "mega"].iter().any(|k| lower.contains(k)) {
        text.push_str(" file sharing cloud storage");
    }

    let path_lower = path.to_ascii_lowercase();
    if ["upload", "api", "chat", "export"].iter().any(|k| path_lower.contains(k)) {
        text.push(' ');
        text.push_str(path.replace('/', " ").trim());
    }

    text
}
