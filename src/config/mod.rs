// src/config/mod.rs
//! Process configuration: environment first (`.env` via dotenvy), with an
//! optional TOML file for per-source alert thresholds.

pub mod thresholds;

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::warn;

use crate::scheduler::ScheduleConfig;
use crate::types::{Cadence, Source};

pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_PROXY_ENDPOINT: &str = "https://api.scrape.do/";

/// Trimmed, non-empty value of an env var.
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Unset or blank gives the default; so does a value that does not parse.
pub fn int_from_env<T: FromStr + Copy>(name: &str, default: T) -> T {
    match env_opt(name) {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "invalid_integer_env_using_default");
            default
        }),
    }
}

/// Days without a new article before a source raises a zero-yield alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertThresholds {
    pub daily_days: i64,
    pub weekly_days: i64,
    pub overrides: HashMap<Source, i64>,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            daily_days: 2,
            weekly_days: 14,
            overrides: HashMap::new(),
        }
    }
}

impl AlertThresholds {
    pub fn for_source(&self, source: Source) -> i64 {
        if let Some(days) = self.overrides.get(&source) {
            return *days;
        }
        match source.cadence() {
            Cadence::Daily => self.daily_days,
            Cadence::Weekly => self.weekly_days,
        }
    }
}

/// Rendering proxy used for Forbes article bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForbesProxyConfig {
    pub token: Option<String>,
    pub endpoint: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for ForbesProxyConfig {
    fn default() -> Self {
        Self {
            token: None,
            endpoint: DEFAULT_PROXY_ENDPOINT.to_string(),
            timeout_secs: 90,
            retries: 2,
            retry_delay_secs: 2,
        }
    }
}

impl ForbesProxyConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            token: env_opt("FORBES_SCRAPEDO_TOKEN").or_else(|| env_opt("SCRAPEDO_TOKEN")),
            endpoint: env_opt("FORBES_SCRAPEDO_ENDPOINT").unwrap_or(d.endpoint),
            timeout_secs: int_from_env("FORBES_SCRAPEDO_TIMEOUT_SECONDS", d.timeout_secs),
            retries: int_from_env("FORBES_SCRAPEDO_RETRIES", d.retries),
            retry_delay_secs: int_from_env("FORBES_SCRAPEDO_RETRY_DELAY_SECONDS", d.retry_delay_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub notion_token: Option<String>,
    pub notion_database_id: Option<String>,
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub port: u16,
    pub http_timeout_secs: u64,
    pub thresholds: AlertThresholds,
    pub digest_lookback_days: i64,
    pub digest_top_per_source: usize,
    pub forbes_proxy: ForbesProxyConfig,
    pub schedule: ScheduleConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notion_token: None,
            notion_database_id: None,
            telegram_token: None,
            chat_id: None,
            slack_webhook_url: None,
            port: DEFAULT_PORT,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            thresholds: AlertThresholds::default(),
            digest_lookback_days: 7,
            digest_top_per_source: 3,
            forbes_proxy: ForbesProxyConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        let overrides =
            thresholds::load_overrides_default().context("loading alert threshold overrides")?;

        Ok(Self {
            notion_token: env_opt("NOTION_TOKEN"),
            notion_database_id: env_opt("NOTION_DATABASE_ID"),
            telegram_token: env_opt("TELEGRAM_TOKEN"),
            chat_id: env_opt("CHAT_ID"),
            slack_webhook_url: env_opt("SLACK_WEBHOOK_URL"),
            port: int_from_env("PORT", d.port),
            http_timeout_secs: int_from_env("HTTP_TIMEOUT_SECONDS", d.http_timeout_secs),
            thresholds: AlertThresholds {
                daily_days: int_from_env("ZERO_NEW_ALERT_DAYS_DAILY", d.thresholds.daily_days),
                weekly_days: int_from_env("ZERO_NEW_ALERT_DAYS_WEEKLY", d.thresholds.weekly_days),
                overrides,
            },
            digest_lookback_days: int_from_env("DIGEST_LOOKBACK_DAYS", d.digest_lookback_days),
            digest_top_per_source: int_from_env("DIGEST_TOP_PER_SOURCE", d.digest_top_per_source),
            forbes_proxy: ForbesProxyConfig::from_env(),
            schedule: ScheduleConfig {
                utc_offset_hours: int_from_env("SCHEDULE_UTC_OFFSET_HOURS", d.schedule.utc_offset_hours),
                hour: int_from_env("SCHEDULE_HOUR", d.schedule.hour),
                minute: int_from_env("SCHEDULE_MINUTE", d.schedule.minute),
            },
        })
    }

    pub fn notion_configured(&self) -> bool {
        self.notion_token.is_some() && self.notion_database_id.is_some()
    }
}
