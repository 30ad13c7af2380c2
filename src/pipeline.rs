// src/pipeline.rs
//! The sync orchestrator: fetch → batch dedupe → per-article run/store checks →
//! content resolution → two-phase write → health update and alerts.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::AlertThresholds;
use crate::content::{self, ContentExtractor};
use crate::dedupe::{Deduplicator, RunDedupeState, StoreVerdict};
use crate::health::SourceHealthTracker;
use crate::metrics::{Counter, SyncCounters};
use crate::notify::NotifierMux;
use crate::sources::SourceRegistry;
use crate::store::RecordStore;
use crate::types::{truncate_chars, Article, Source};

/// Characters of a fetch error quoted in the operator alert.
const ALERT_ERROR_CHARS: usize = 220;
/// Errors quoted in the aggregate failure summary of an all-sources run.
const SUMMARY_ERRORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncTarget {
    All,
    One(Source),
}

impl SyncTarget {
    /// `0` is every source; `1..=6` a single one.
    pub fn from_id(id: u8) -> Option<Self> {
        if id == 0 {
            return Some(SyncTarget::All);
        }
        Source::from_id(id).map(SyncTarget::One)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub target: SyncTarget,
    pub days: i64,
    pub silent: bool,
    pub trigger: String,
}

impl SyncRequest {
    pub fn new(target: SyncTarget, days: i64, trigger: impl Into<String>) -> Self {
        Self {
            target,
            days: days.max(0),
            silent: false,
            trigger: trigger.into(),
        }
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub added: u64,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Started,
    Fetched(usize),
    Deduped(usize),
    Uploading(usize),
    Finished,
    Failed,
}

pub struct SyncOrchestrator {
    registry: SourceRegistry,
    store: Arc<dyn RecordStore>,
    notifier: Arc<NotifierMux>,
    health: Arc<SourceHealthTracker>,
    counters: Arc<SyncCounters>,
    dedup: Deduplicator,
    thresholds: AlertThresholds,
}

impl SyncOrchestrator {
    pub fn new(
        registry: SourceRegistry,
        store: Arc<dyn RecordStore>,
        notifier: Arc<NotifierMux>,
        health: Arc<SourceHealthTracker>,
        counters: Arc<SyncCounters>,
        thresholds: AlertThresholds,
    ) -> Self {
        Self {
            registry,
            store,
            notifier,
            health,
            dedup: Deduplicator::new(counters.clone()),
            counters,
            thresholds,
        }
    }

    /// One invocation. The run-layer dedupe state lives exactly this long.
    pub async fn run(&self, request: &SyncRequest) -> SyncReport {
        let mut seen = RunDedupeState::new();
        match request.target {
            SyncTarget::One(source) => {
                self.run_source(source, request.days, request.silent, &request.trigger, &mut seen)
                    .await
            }
            SyncTarget::All => self.run_all(request, &mut seen).await,
        }
    }

    /// Every registered source in id order, silently; one failure never stops the rest.
    async fn run_all(&self, request: &SyncRequest, seen: &mut RunDedupeState) -> SyncReport {
        let mut total = SyncReport::default();
        for source in self.registry.sources() {
            let report = self
                .run_source(source, request.days, true, &request.trigger, seen)
                .await;
            total.added += report.added;
            total.errors.extend(report.errors);
        }

        if !request.silent && total.added > 0 {
            self.notifier
                .notify(&format!(
                    "Articles were added to the database ({} across all sources).",
                    total.added
                ))
                .await;
        }
        if !request.silent && !total.errors.is_empty() {
            let summary = total
                .errors
                .iter()
                .take(SUMMARY_ERRORS)
                .cloned()
                .collect::<Vec<_>>()
                .join("; ");
            self.notifier
                .notify(&format!("One or more syncs failed: {summary}"))
                .await;
        }
        total
    }

    pub async fn run_source(
        &self,
        source: Source,
        days: i64,
        silent: bool,
        trigger: &str,
        seen: &mut RunDedupeState,
    ) -> SyncReport {
        let name = source.name();
        let Some(strategy) = self.registry.get(source).cloned() else {
            error!(source = name, "no_fetcher_registered");
            return SyncReport {
                added: 0,
                errors: vec![format!("Unknown source_id {}", source.id())],
            };
        };

        let end = Utc::now().date_naive();
        let start = end - Duration::days(days.max(0));
        self.health.on_start(source, Utc::now());
        self.counters.incr(Counter::SyncRuns);
        info!(
            source = name,
            source_id = source.id(),
            start_date = %start,
            end_date = %end,
            days,
            trigger,
            "sync_started"
        );
        debug!(source = name, stage = ?SyncStage::Started, "sync_stage");

        let articles = match strategy.fetcher.fetch(start, end).await {
            Ok(a) => a,
            Err(e) => {
                let err = e.to_string();
                self.health.on_failure(source, &err, Utc::now());
                self.counters.incr(Counter::SyncRunsFailure);
                error!(source = name, source_id = source.id(), days, trigger, error = %err, "sync_failed");
                debug!(source = name, stage = ?SyncStage::Failed, "sync_stage");
                self.notifier
                    .notify(&format!(
                        "ALERT: Sync failed for {name} (days={days}, trigger={trigger}). Error: {}",
                        truncate_chars(&err, ALERT_ERROR_CHARS)
                    ))
                    .await;
                return SyncReport {
                    added: 0,
                    errors: vec![format!("{name}: {err}")],
                };
            }
        };

        let fetched = articles.len();
        debug!(source = name, stage = ?SyncStage::Fetched(fetched), "sync_stage");
        let articles = self.dedup.batch(source, articles);
        let after_dedupe = articles.len();
        debug!(source = name, stage = ?SyncStage::Deduped(after_dedupe), "sync_stage");

        let mut added = 0u64;
        for (i, article) in articles.iter().enumerate() {
            debug!(source = name, stage = ?SyncStage::Uploading(i), "sync_stage");
            if self.upload(article, strategy.extractor.as_ref(), seen).await {
                added += 1;
            }
        }

        self.health.on_success(source, added, Utc::now());
        self.counters.incr(Counter::SyncRunsSuccess);
        info!(
            source = name,
            source_id = source.id(),
            trigger,
            days,
            fetched,
            fetched_after_dedupe = after_dedupe,
            added,
            "sync_finished"
        );
        debug!(source = name, stage = ?SyncStage::Finished, "sync_stage");

        if added == 0 {
            let threshold = self.thresholds.for_source(source);
            if let Some(alert) = self.health.maybe_alert(source, threshold, Utc::now()) {
                self.notifier.notify(&alert.message(trigger)).await;
                info!(
                    source = name,
                    days_without_new = alert.days_without_new,
                    threshold_days = alert.threshold_days,
                    trigger,
                    "zero_new_alert_sent"
                );
            }
        }
        if added > 0 && !silent {
            self.notifier
                .notify(&format!("Articles were added to the database ({added} from {name})."))
                .await;
        }

        SyncReport {
            added,
            errors: Vec::new(),
        }
    }

    /// Returns true only when a record was created.
    async fn upload(
        &self,
        article: &Article,
        extractor: &dyn ContentExtractor,
        seen: &mut RunDedupeState,
    ) -> bool {
        if !self.dedup.admit_run(seen, article) {
            return false;
        }
        if self.dedup.check_store(self.store.as_ref(), article).await != StoreVerdict::Novel {
            return false;
        }

        let blocks = content::resolve(article, extractor).await;
        match self.store.create(article, &blocks).await {
            Ok(mode) => {
                self.counters.incr(Counter::ArticlesUploaded);
                info!(
                    source = article.source.name(),
                    link = %article.link,
                    blocks = blocks.len(),
                    mode = ?mode,
                    "article_uploaded"
                );
                true
            }
            Err(e) => {
                self.counters.incr(Counter::StoreWriteFailures);
                warn!(
                    source = article.source.name(),
                    link = %article.link,
                    error = %e,
                    "article_upload_failed"
                );
                false
            }
        }
    }
}
