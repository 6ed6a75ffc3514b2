// Embedder trait — the swap-ready abstraction over the embedding capability.
//
// The engine consumes embeddings as an opaque capability: text in, vector
// out. The default implementation calls an HTTP endpoint; tests substitute
// deterministic or deliberately slow embedders.

use anyhow::Result;
use async_trait::async_trait;

/// Maps text to a fixed-length vector. Implementations must be async
/// because the production provider is a network call.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;
}
