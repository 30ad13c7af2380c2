// src/store/mod.rs
//! Record store port: idempotent existence checks, a two-phase write, and the
//! read-only queries behind the operator reports.

pub mod memory;
pub mod notion;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::StoreError;
use crate::types::{Article, ContentBlock};

/// Result of an existence lookup. `Unknown` means a transport or protocol error,
/// never "no rows".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    Found,
    NotFound,
    Unknown,
}

/// How a successful create landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    MetadataOnly,
}

/// A record read back from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoredEntry {
    pub title: String,
    pub url: String,
    pub source: String,
    pub date: String,
    pub created_time: String,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Try each candidate URL in order; `Found` on the first match.
    async fn exists(&self, url_variants: &[String]) -> Existence;

    /// One create attempt. `blocks == None` writes metadata only.
    async fn create_page(
        &self,
        article: &Article,
        blocks: Option<&[ContentBlock]>,
    ) -> Result<(), StoreError>;

    /// Latest records by creation time.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredEntry>, StoreError>;

    /// Records dated on or after `start`, newest first.
    async fn since(&self, start: NaiveDate, page_size: usize) -> Result<Vec<StoredEntry>, StoreError>;

    /// Walk up to `max_pages` pages of records, newest first.
    async fn scan(&self, max_pages: usize) -> Result<Vec<StoredEntry>, StoreError>;

    /// Full write first; when the store rejects it, retry once without content.
    /// Transport failures are not retried.
    async fn create(&self, article: &Article, blocks: &[ContentBlock]) -> Result<WriteMode, StoreError> {
        let initial = match self.create_page(article, Some(blocks)).await {
            Ok(()) => return Ok(WriteMode::Full),
            Err(e @ StoreError::Rejected { .. }) => e,
            Err(e) => {
                error!(source = article.source.name(), link = %article.link, error = %e, "store_page_create_error");
                return Err(e);
            }
        };

        warn!(
            source = article.source.name(),
            link = %article.link,
            blocks = blocks.len(),
            error = %initial,
            "store_full_write_rejected_retrying_metadata_only"
        );
        match self.create_page(article, None).await {
            Ok(()) => Ok(WriteMode::MetadataOnly),
            Err(e) => {
                error!(
                    source = article.source.name(),
                    link = %article.link,
                    error = %e,
                    initial_error = %initial,
                    "store_page_create_failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{InMemoryStore, WriteBehavior};
    use super::*;
    use crate::types::Source;

    fn article() -> Article {
        Article::new(
            "Title",
            "https://x.test/a",
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            Source::TheDrum,
        )
    }

    fn blocks() -> Vec<ContentBlock> {
        vec![ContentBlock::Paragraph("body".into())]
    }

    #[tokio::test]
    async fn full_write_succeeds_first_time() {
        let store = InMemoryStore::new();
        let mode = store.create(&article(), &blocks()).await.unwrap();
        assert_eq!(mode, WriteMode::Full);
        assert_eq!(store.create_attempts(), 1);
        assert_eq!(store.pages()[0].blocks.len(), 1);
    }

    #[tokio::test]
    async fn rejected_full_write_falls_back_to_metadata() {
        let store = InMemoryStore::new().with_writes(WriteBehavior::RejectContent);
        let mode = store.create(&article(), &blocks()).await.unwrap();
        assert_eq!(mode, WriteMode::MetadataOnly);
        assert_eq!(store.create_attempts(), 2);
        assert!(store.pages()[0].blocks.is_empty());
    }

    #[tokio::test]
    async fn both_phases_rejected_is_a_failure() {
        let store = InMemoryStore::new().with_writes(WriteBehavior::RejectAll);
        assert!(store.create(&article(), &blocks()).await.is_err());
        assert_eq!(store.create_attempts(), 2);
        assert!(store.pages().is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_not_retried() {
        let store = InMemoryStore::new().with_writes(WriteBehavior::TransportError);
        assert!(store.create(&article(), &blocks()).await.is_err());
        assert_eq!(store.create_attempts(), 1);
    }
}
