// Webhook alert delivery.
//
// Posts verdict JSON to a configured endpoint (Slack-style incoming
// webhook, SIEM collector, anything that accepts JSON). Only verdicts at
// or above the alert threshold are delivered; everything below is logged
// locally and skipped here.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::Dispatcher;
use crate::fusion::Verdict;

/// Transport-level budget for one webhook POST.
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookDispatcher {
    client: Client,
    url: String,
    /// Minimum risk score that warrants human attention
    threshold: u8,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, threshold: u8) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
            threshold,
        })
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn dispatch(&self, verdict: &Verdict) -> Result<()> {
        if verdict.risk_score < self.threshold {
            debug!(
                event_ref = verdict.event_ref,
                score = verdict.risk_score,
                "Below alert threshold, not delivering"
            );
            return Ok(());
        }

        let response = self
            .client
            .post(&self.url)
            .json(verdict)
            .send()
            .await
            .context("Failed to call alert webhook")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Alert webhook returned {}: {}", status, body);
        }

        debug!(
            event_ref = verdict.event_ref,
            score = verdict.risk_score,
            "Alert delivered"
        );
        Ok(())
    }
}
