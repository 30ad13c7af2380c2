// src/store/memory.rs
//! In-process record store for tests and dry runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{Existence, RecordStore, StoredEntry};
use crate::error::StoreError;
use crate::types::{Article, ContentBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteBehavior {
    #[default]
    Accept,
    /// Reject writes that carry content blocks; accept metadata-only.
    RejectContent,
    RejectAll,
    TransportError,
}

#[derive(Debug, Clone)]
pub struct StoredPage {
    pub article: Article,
    pub blocks: Vec<ContentBlock>,
    pub created_time: String,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    pages: Mutex<Vec<StoredPage>>,
    known_urls: Mutex<Vec<String>>,
    exists_unavailable: bool,
    writes: WriteBehavior,
    exists_calls: AtomicUsize,
    create_attempts: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend these URLs were recorded by an earlier process.
    pub fn with_existing<I, S>(self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(urls.into_iter().map(Into::into));
        self
    }

    /// Every existence check reports `Unknown`.
    pub fn unavailable(mut self) -> Self {
        self.exists_unavailable = true;
        self
    }

    pub fn with_writes(mut self, writes: WriteBehavior) -> Self {
        self.writes = writes;
        self
    }

    pub fn pages(&self) -> Vec<StoredPage> {
        self.pages.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn create_attempts(&self) -> usize {
        self.create_attempts.load(Ordering::SeqCst)
    }

    fn entries(&self) -> Vec<StoredEntry> {
        let pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        pages
            .iter()
            .rev()
            .map(|p| StoredEntry {
                title: p.article.title.clone(),
                url: p.article.link.clone(),
                source: p.article.source.name().to_string(),
                date: p.article.date.to_string(),
                created_time: p.created_time.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn exists(&self, url_variants: &[String]) -> Existence {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.exists_unavailable {
            return Existence::Unknown;
        }
        let known = self.known_urls.lock().unwrap_or_else(|e| e.into_inner());
        let pages = self.pages.lock().unwrap_or_else(|e| e.into_inner());
        let hit = url_variants.iter().any(|v| {
            known.iter().any(|k| k == v) || pages.iter().any(|p| &p.article.link == v)
        });
        if hit {
            Existence::Found
        } else {
            Existence::NotFound
        }
    }

    async fn create_page(
        &self,
        article: &Article,
        blocks: Option<&[ContentBlock]>,
    ) -> Result<(), StoreError> {
        self.create_attempts.fetch_add(1, Ordering::SeqCst);
        let rejected = StoreError::Rejected {
            status: 400,
            message: "validation_error".into(),
        };
        match (self.writes, blocks) {
            (WriteBehavior::TransportError, _) => {
                return Err(StoreError::Transport("connection reset".into()))
            }
            (WriteBehavior::RejectAll, _) | (WriteBehavior::RejectContent, Some(_)) => {
                return Err(rejected)
            }
            _ => {}
        }
        self.pages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(StoredPage {
                article: article.clone(),
                blocks: blocks.map(<[ContentBlock]>::to_vec).unwrap_or_default(),
                created_time: Utc::now().to_rfc3339(),
            });
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredEntry>, StoreError> {
        Ok(self.entries().into_iter().take(limit).collect())
    }

    async fn since(&self, start: NaiveDate, page_size: usize) -> Result<Vec<StoredEntry>, StoreError> {
        let start = start.to_string();
        let mut out: Vec<_> = self
            .entries()
            .into_iter()
            .filter(|e| e.date >= start)
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date));
        out.truncate(page_size);
        Ok(out)
    }

    async fn scan(&self, _max_pages: usize) -> Result<Vec<StoredEntry>, StoreError> {
        Ok(self.entries())
    }
}
