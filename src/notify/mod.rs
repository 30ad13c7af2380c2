// src/notify/mod.rs
//! Operator notifications. Best-effort: failures are logged, never escalated.

pub mod slack;
pub mod telegram;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::NotifyError;
use crate::metrics::{Counter, SyncCounters};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
    fn name(&self) -> &'static str;
}

/// Fans a message out to every configured channel.
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
    counters: Arc<SyncCounters>,
}

impl NotifierMux {
    pub fn new(channels: Vec<Box<dyn Notifier>>, counters: Arc<SyncCounters>) -> Self {
        Self { channels, counters }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns true when at least one channel accepted the message.
    pub async fn notify(&self, text: &str) -> bool {
        if self.channels.is_empty() {
            info!(reason = "no_channels_configured", "notification_skipped");
            return false;
        }
        let mut delivered = false;
        for ch in &self.channels {
            match ch.send(text).await {
                Ok(()) => {
                    delivered = true;
                    self.counters.incr(Counter::Notifications);
                }
                Err(NotifyError::Disabled(why)) => {
                    info!(channel = ch.name(), reason = why, "notification_skipped");
                }
                Err(e) => {
                    warn!(channel = ch.name(), error = %e, "notification_failed");
                }
            }
        }
        delivered
    }
}

/// Keeps every message in memory; handy for tests and dry runs.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
