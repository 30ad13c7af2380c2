// src/dedupe.rs
//! Three-layer duplicate suppression: within one fetch batch, within one run,
//! and against the record store. Every rejection bumps the counter of its layer.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::metrics::{Counter, SyncCounters};
use crate::store::{Existence, RecordStore};
use crate::types::{collapse_ws, Article, Source};
use crate::url_norm::{normalize, url_variants};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchReason {
    UrlInBatch,
    TitleDateInBatch,
}

impl BatchReason {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchReason::UrlInBatch => "url_in_batch",
            BatchReason::TitleDateInBatch => "title_date_in_batch",
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub kept: Vec<Article>,
    pub rejected: Vec<(Article, BatchReason)>,
}

/// Batch layer. First occurrence wins and input order is preserved.
/// Survivors carry their normalized link when one could be computed.
pub fn dedupe_batch(articles: Vec<Article>) -> BatchOutcome {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_keys: HashSet<(Source, NaiveDate, String)> = HashSet::new();
    let mut out = BatchOutcome::default();

    for mut article in articles {
        let url = normalize(&article.link);
        let key = (
            article.source,
            article.date,
            collapse_ws(&article.title.to_lowercase()),
        );

        let reason = if !url.is_empty() && seen_urls.contains(&url) {
            Some(BatchReason::UrlInBatch)
        } else if seen_keys.contains(&key) {
            Some(BatchReason::TitleDateInBatch)
        } else {
            None
        };
        if let Some(reason) = reason {
            out.rejected.push((article, reason));
            continue;
        }

        if !url.is_empty() {
            seen_urls.insert(url.clone());
            article.link = url;
        }
        seen_keys.insert(key);
        out.kept.push(article);
    }
    out
}

/// Canonical URLs uploaded during one orchestrator invocation. Never persisted.
#[derive(Debug, Default)]
pub struct RunDedupeState {
    seen: HashSet<String>,
}

impl RunDedupeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run layer: false if the URL was already admitted in this run, otherwise records it.
    /// Empty URLs are always admitted.
    pub fn admit(&mut self, normalized_url: &str) -> bool {
        if normalized_url.is_empty() {
            return true;
        }
        self.seen.insert(normalized_url.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Outcome of the store layer for one article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreVerdict {
    Novel,
    Duplicate,
    /// Existence unknown; the article must not be created.
    Unavailable,
}

/// Applies the three layers with counting and structured logging.
pub struct Deduplicator {
    counters: Arc<SyncCounters>,
}

impl Deduplicator {
    pub fn new(counters: Arc<SyncCounters>) -> Self {
        Self { counters }
    }

    pub fn batch(&self, source: Source, articles: Vec<Article>) -> Vec<Article> {
        let outcome = dedupe_batch(articles);
        for (article, reason) in &outcome.rejected {
            self.counters.incr(Counter::DuplicateSkippedBatch);
            info!(
                source = source.name(),
                reason = reason.as_str(),
                url = %article.link,
                title = %article.title,
                "duplicate_skipped_batch"
            );
        }
        outcome.kept
    }

    pub fn admit_run(&self, state: &mut RunDedupeState, article: &Article) -> bool {
        let url = normalize(&article.link);
        if state.admit(&url) {
            return true;
        }
        self.counters.incr(Counter::DuplicateSkippedRuntime);
        info!(
            source = article.source.name(),
            url = %url,
            title = %article.title,
            "duplicate_skipped_runtime"
        );
        false
    }

    /// Store layer: fail closed when existence cannot be established.
    pub async fn check_store(&self, store: &dyn RecordStore, article: &Article) -> StoreVerdict {
        let variants = url_variants(&article.link);
        match store.exists(&variants).await {
            Existence::NotFound => StoreVerdict::Novel,
            Existence::Found => {
                self.counters.incr(Counter::DuplicateSkippedStore);
                info!(
                    source = article.source.name(),
                    url = %article.link,
                    title = %article.title,
                    "duplicate_skipped_store"
                );
                StoreVerdict::Duplicate
            }
            Existence::Unknown => {
                self.counters.incr(Counter::StoreQueryFailures);
                self.counters.incr(Counter::DedupeCheckUnavailable);
                info!(
                    source = article.source.name(),
                    url = %article.link,
                    title = %article.title,
                    "duplicate_check_unavailable_skip"
                );
                StoreVerdict::Unavailable
            }
        }
    }
}
