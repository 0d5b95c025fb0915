//! services/agent/src/adapters/delivery.rs
//!
//! Implementations of the `DeliverySink` port: a log-only sink for local runs and
//! a webhook sink that POSTs each payload to a configured URL.

use async_trait::async_trait;
use reminder_core::domain::Payload;
use reminder_core::ports::{DeliverySink, PortError, PortResult};
use tracing::info;

//=========================================================================================
// Log Sink
//=========================================================================================

/// Writes each notification to the log. Never fails.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

#[async_trait]
impl DeliverySink for LogSink {
    async fn deliver(&self, payload: &Payload) -> PortResult<()> {
        info!(title = %payload.title, body = %payload.body, "Reminder notification");
        Ok(())
    }
}

//=========================================================================================
// Webhook Sink
//=========================================================================================

/// POSTs the payload as JSON. Any non-2xx response counts as a failed delivery.
#[derive(Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    /// Creates a new `WebhookSink`.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl DeliverySink for WebhookSink {
    async fn deliver(&self, payload: &Payload) -> PortResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| PortError::DeliveryFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PortError::DeliveryFailed(format!(
                "webhook responded with {}",
                status
            )));
        }
        Ok(())
    }
}
