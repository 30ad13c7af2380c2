// src/metrics.rs
use std::sync::Mutex;

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

use crate::health::SourceHealthRecord;
use crate::types::Source;

/// Process-wide pipeline counters. Mirrored into the `metrics` facade on every bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    SyncRuns,
    SyncRunsSuccess,
    SyncRunsFailure,
    ArticlesUploaded,
    Notifications,
    StoreQueryFailures,
    StoreWriteFailures,
    DuplicateSkippedStore,
    DuplicateSkippedRuntime,
    DuplicateSkippedBatch,
    DedupeCheckUnavailable,
}

impl Counter {
    pub const ALL: [Counter; 11] = [
        Counter::SyncRuns,
        Counter::SyncRunsSuccess,
        Counter::SyncRunsFailure,
        Counter::ArticlesUploaded,
        Counter::Notifications,
        Counter::StoreQueryFailures,
        Counter::StoreWriteFailures,
        Counter::DuplicateSkippedStore,
        Counter::DuplicateSkippedRuntime,
        Counter::DuplicateSkippedBatch,
        Counter::DedupeCheckUnavailable,
    ];

    pub fn metric_name(self) -> &'static str {
        match self {
            Counter::SyncRuns => "branding_sync_runs_total",
            Counter::SyncRunsSuccess => "branding_sync_runs_success_total",
            Counter::SyncRunsFailure => "branding_sync_runs_failure_total",
            Counter::ArticlesUploaded => "branding_articles_uploaded_total",
            Counter::Notifications => "branding_notifications_total",
            Counter::StoreQueryFailures => "branding_store_query_failures_total",
            Counter::StoreWriteFailures => "branding_store_write_failures_total",
            Counter::DuplicateSkippedStore => "branding_duplicate_skipped_store_total",
            Counter::DuplicateSkippedRuntime => "branding_duplicate_skipped_runtime_total",
            Counter::DuplicateSkippedBatch => "branding_duplicate_skipped_batch_total",
            Counter::DedupeCheckUnavailable => "branding_dedupe_check_unavailable_total",
        }
    }

    fn help(self) -> &'static str {
        match self {
            Counter::SyncRuns => "Total number of sync runs.",
            Counter::SyncRunsSuccess => "Total successful sync runs.",
            Counter::SyncRunsFailure => "Total failed sync runs.",
            Counter::ArticlesUploaded => "Total articles uploaded to the record store.",
            Counter::Notifications => "Total operator notifications delivered.",
            Counter::StoreQueryFailures => "Record store queries that failed.",
            Counter::StoreWriteFailures => "Record creations that failed after the metadata-only retry.",
            Counter::DuplicateSkippedStore => "Duplicates skipped because the URL already exists in the store.",
            Counter::DuplicateSkippedRuntime => "Duplicates skipped within one sync run.",
            Counter::DuplicateSkippedBatch => "Duplicates skipped during batch preprocessing.",
            Counter::DedupeCheckUnavailable => "Items skipped because the store existence check failed.",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub sync_runs_total: u64,
    pub sync_runs_success_total: u64,
    pub sync_runs_failure_total: u64,
    pub articles_uploaded_total: u64,
    pub notifications_total: u64,
    pub store_query_failures_total: u64,
    pub store_write_failures_total: u64,
    pub duplicate_skipped_store_total: u64,
    pub duplicate_skipped_runtime_total: u64,
    pub duplicate_skipped_batch_total: u64,
    pub dedupe_check_unavailable_total: u64,
}

impl CounterSnapshot {
    fn slot(&mut self, c: Counter) -> &mut u64 {
        match c {
            Counter::SyncRuns => &mut self.sync_runs_total,
            Counter::SyncRunsSuccess => &mut self.sync_runs_success_total,
            Counter::SyncRunsFailure => &mut self.sync_runs_failure_total,
            Counter::ArticlesUploaded => &mut self.articles_uploaded_total,
            Counter::Notifications => &mut self.notifications_total,
            Counter::StoreQueryFailures => &mut self.store_query_failures_total,
            Counter::StoreWriteFailures => &mut self.store_write_failures_total,
            Counter::DuplicateSkippedStore => &mut self.duplicate_skipped_store_total,
            Counter::DuplicateSkippedRuntime => &mut self.duplicate_skipped_runtime_total,
            Counter::DuplicateSkippedBatch => &mut self.duplicate_skipped_batch_total,
            Counter::DedupeCheckUnavailable => &mut self.dedupe_check_unavailable_total,
        }
    }

    pub fn get(&self, c: Counter) -> u64 {
        let mut copy = *self;
        *copy.slot(c)
    }
}

/// Aggregate counters behind one lock; each bump is a single read-modify-write.
#[derive(Debug, Default)]
pub struct SyncCounters {
    inner: Mutex<CounterSnapshot>,
}

impl SyncCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, c: Counter) {
        self.add(c, 1);
    }

    pub fn add(&self, c: Counter, n: u64) {
        {
            let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            *guard.slot(c) += n;
        }
        counter!(c.metric_name()).increment(n);
    }

    pub fn get(&self, c: Counter) -> u64 {
        self.snapshot().get(c)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn epoch_secs(ts: Option<DateTime<Utc>>) -> f64 {
    ts.map(|t| t.timestamp().max(0) as f64).unwrap_or(0.0)
}

/// Publish the per-source health series for one source.
pub fn publish_source_gauges(source: Source, rec: &SourceHealthRecord) {
    let label = source.name();
    gauge!("branding_source_total_runs", "source" => label).set(rec.total_runs as f64);
    gauge!("branding_source_total_added", "source" => label).set(rec.total_added as f64);
    gauge!("branding_source_total_failures", "source" => label).set(rec.total_failures as f64);
    gauge!("branding_source_consecutive_zero_runs", "source" => label)
        .set(rec.consecutive_zero_runs as f64);
    gauge!("branding_source_last_success_timestamp", "source" => label)
        .set(epoch_secs(rec.last_success));
    gauge!("branding_source_last_run_timestamp", "source" => label).set(epoch_secs(rec.last_run));
}

fn describe_series() {
    for c in Counter::ALL {
        describe_counter!(c.metric_name(), c.help());
    }
    describe_gauge!("branding_source_total_runs", "Sync runs per source.");
    describe_gauge!("branding_source_total_added", "Articles added per source.");
    describe_gauge!("branding_source_total_failures", "Failed sync runs per source.");
    describe_gauge!(
        "branding_source_consecutive_zero_runs",
        "Consecutive successful runs that added nothing."
    );
    describe_gauge!(
        "branding_source_last_success_timestamp",
        "Unix ts of the last successful run per source."
    );
    describe_gauge!(
        "branding_source_last_run_timestamp",
        "Unix ts of the last run per source."
    );
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and register every series at zero
    /// so `/metrics` shows them before the first sync.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe_series();
        for c in Counter::ALL {
            counter!(c.metric_name()).increment(0);
        }
        let zero = SourceHealthRecord::default();
        for s in Source::ALL {
            publish_source_gauges(s, &zero);
        }

        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
