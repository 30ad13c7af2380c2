use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::Notifier;
use crate::error::NotifyError;

/// Optional mirror of operator messages into a Slack incoming webhook.
pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: Client,
    timeout: Duration,
}

impl SlackNotifier {
    pub fn new(url: Option<String>) -> Self {
        Self {
            webhook_url: url.filter(|u| !u.trim().is_empty()),
            client: Client::new(),
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!("Slack disabled (no SLACK_WEBHOOK_URL)");
            return Err(NotifyError::Disabled("no_webhook_url"));
        };

        let body = serde_json::json!({ "text": text });
        let rsp = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;
        if !rsp.status().is_success() {
            return Err(NotifyError::Status(rsp.status().as_u16()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
