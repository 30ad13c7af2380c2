// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod types;
pub mod url_norm;

// Pipeline stages
pub mod content;
pub mod dedupe;
pub mod pipeline;
pub mod sources;
pub mod store;

// Health, metrics and operator surfaces
pub mod api;
pub mod health;
pub mod metrics;
pub mod notify;
pub mod report;

// Background execution
pub mod scheduler;
pub mod worker;

pub use crate::api::{create_router, AppState};
pub use crate::pipeline::{SyncOrchestrator, SyncReport, SyncRequest, SyncTarget};
pub use crate::types::{Article, ContentBlock, Source};
