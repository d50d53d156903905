use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use jarvis_core::sink::{Delivery, NotificationSink, SinkError};

/// Slack incoming-webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Incoming webhook URL. Usually supplied through `SLACK_WEBHOOK_URL`.
    /// When unset, messages are logged instead of posted.
    #[serde(skip_serializing)]
    pub webhook_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Serialize)]
struct SlackMessage<'a> {
    text: &'a str,
}

/// [`NotificationSink`] posting `{"text": ...}` to a Slack incoming webhook.
pub struct SlackSink {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(config: SlackConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SinkError::Transport(format!("failed to create HTTP client: {e}")))?;
        let webhook_url = config.webhook_url.filter(|u| !u.is_empty());
        if webhook_url.is_none() {
            tracing::warn!("No Slack webhook URL configured, notifications will only be logged");
        }
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

#[async_trait]
impl NotificationSink for SlackSink {
    async fn send(&self, text: &str) -> Result<Delivery, SinkError> {
        let Some(url) = self.webhook_url.as_deref() else {
            tracing::info!(message = text, "Mock Slack notification");
            return Ok(Delivery::Logged);
        };

        let resp = self
            .client
            .post(url)
            .json(&SlackMessage { text })
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Status(status.as_u16()));
        }
        Ok(Delivery::Sent)
    }
}
