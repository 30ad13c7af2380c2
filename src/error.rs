// src/error.rs
//! Error taxonomy of the sync pipeline.
//!
//! Only [`FetchError`] aborts anything, and only the invocation for one source.
//! Store and notification errors are logged and counted by their callers.

use thiserror::Error;

/// Source unreachable or its listing unparseable.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Error fetching {site}: {message}")]
    Transport { site: String, message: String },

    #[error("Error fetching {site}: HTTP status {status}")]
    Status { site: String, status: u16 },

    #[error("Error parsing {site}: {message}")]
    Parse { site: String, message: String },
}

impl FetchError {
    pub fn transport(site: impl Into<String>, err: impl std::fmt::Display) -> Self {
        FetchError::Transport {
            site: site.into(),
            message: err.to_string(),
        }
    }
}

/// Record store failures (queries and writes).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store is not configured")]
    NotConfigured,

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Transport(err.to_string())
    }
}

/// Best-effort notification failures; never escalated.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel disabled: {0}")]
    Disabled(&'static str),

    #[error("notification transport error: {0}")]
    Transport(String),

    #[error("notification rejected with status {0}")]
    Status(u16),
}

impl From<reqwest::Error> for NotifyError {
    fn from(err: reqwest::Error) -> Self {
        NotifyError::Transport(err.to_string())
    }
}

/// The pipeline worker is gone (shutdown or panic).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline worker is not running")]
    Closed,

    #[error("pipeline worker dropped the job before replying")]
    Dropped,
}
