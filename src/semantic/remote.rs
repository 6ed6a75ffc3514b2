// HTTP embedding provider.
//
// Speaks the common `{"input": text}` → `{"embedding": [..]}` shape that
// hosted embedding services expose. The classifier wraps every call in its
// own timeout, so this client carries only a generous transport-level one.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::traits::Embedder;

/// Embedder backed by a remote HTTP endpoint.
pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let request = EmbedRequest { input: text };

        let mut builder = self.client.post(&self.url).json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .context("Failed to call embedding endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding endpoint returned {}: {}", status, body);
        }

        let result: EmbedResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        debug!(
            dim = result.embedding.len(),
            text_preview = &text[..text.len().min(50)],
            "Embedded descriptor"
        );

        Ok(result.embedding)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f64>,
}
