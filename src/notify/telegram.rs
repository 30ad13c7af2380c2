use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::Notifier;
use crate::error::NotifyError;

/// Telegram Bot API `sendMessage` to a single chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    token: Option<String>,
    chat_id: Option<String>,
    client: Client,
    timeout: Duration,
    api_base: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(token: Option<String>, chat_id: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            chat_id: chat_id.filter(|c| !c.trim().is_empty()),
            client: Client::new(),
            timeout: Duration::from_secs(20),
            api_base: "https://api.telegram.org".to_string(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.chat_id.is_some()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let (Some(token), Some(chat_id)) = (&self.token, &self.chat_id) else {
            return Err(NotifyError::Disabled("missing_token_or_chat_id"));
        };

        let rsp = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, token))
            .timeout(self.timeout)
            .json(&SendMessage { chat_id, text })
            .send()
            .await?;
        if !rsp.status().is_success() {
            return Err(NotifyError::Status(rsp.status().as_u16()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_disable_the_channel() {
        let t = TelegramNotifier::new(Some("tok".into()), None);
        assert!(!t.is_configured());
        assert!(matches!(t.send("x").await, Err(NotifyError::Disabled(_))));
    }
}
