use crate::event::Event;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Outbound transport for events.
///
/// Implementations deliver one event to one URL. Failures are reported to the
/// caller, which decides what to do with them (the outbound sender logs and
/// drops).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, url: &str, event: &Event) -> Result<()>;
}

/// Publisher that POSTs the JSON wire envelope over HTTP.
#[derive(Clone)]
pub struct HttpPublisher {
    http_client: reqwest::Client,
}

impl HttpPublisher {
    /// Creates a publisher whose requests fail after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, url: &str, event: &Event) -> Result<()> {
        debug!(topic = %event.topic(), url = %url, "Posting event");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "application/json")
            .json(event)
            .send()
            .await
            .with_context(|| format!("Failed to send event to '{}'", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());

            anyhow::bail!("Event receiver returned error status {}: {}", status, body);
        }

        Ok(())
    }
}
