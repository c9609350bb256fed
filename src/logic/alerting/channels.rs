//! Notification channels

use std::time::Duration;

use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("webhook request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("webhook returned HTTP {0}")]
    Status(u16),
}

/// Slack-compatible incoming webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self { client, url: url.into() })
    }

    /// POST `{"text": message}`; anything but 2xx is a failure
    pub async fn send(&self, message: &str) -> Result<(), NotificationError> {
        let response = self.client
            .post(&self.url)
            .json(&json!({ "text": message }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Status(status.as_u16()));
        }

        tracing::info!("Alert sent to webhook ({})", status);
        Ok(())
    }
}

/// Email delivery is not wired to a provider; it only records intent
pub struct EmailNotifier {
    recipients: Vec<String>,
}

impl EmailNotifier {
    pub fn new(recipients: Vec<String>) -> Self {
        Self { recipients }
    }

    pub fn send(&self, message: &str) -> Result<(), NotificationError> {
        tracing::info!(
            "Would send email alert to {:?}: {}",
            self.recipients,
            message
        );
        Ok(())
    }
}
