// src/health.rs
//! Per-source run history driving zero-yield alerts.
//!
//! The record map is owned here and never handed out; callers go through the
//! transition methods, each of which is one read-modify-write under the lock.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::metrics::publish_source_gauges;
use crate::types::Source;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceHealthRecord {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_added_count: u64,
    pub total_runs: u64,
    pub total_added: u64,
    pub total_failures: u64,
    pub consecutive_failures: u64,
    pub consecutive_zero_runs: u64,
    pub first_run_at: Option<DateTime<Utc>>,
    pub last_non_zero_at: Option<DateTime<Utc>>,
    pub last_zero_alert_at: Option<DateTime<Utc>>,
}

/// A zero-yield alert that fired; the caller delivers it outside the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZeroAlert {
    pub source: Source,
    pub days_without_new: i64,
    pub threshold_days: i64,
}

impl ZeroAlert {
    pub fn message(&self, trigger: &str) -> String {
        format!(
            "ALERT: {} has produced zero new articles for {} days. (threshold={}, trigger={})",
            self.source.name(),
            self.days_without_new,
            self.threshold_days,
            trigger
        )
    }
}

#[derive(Debug)]
pub struct SourceHealthTracker {
    records: Mutex<HashMap<Source, SourceHealthRecord>>,
}

impl Default for SourceHealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceHealthTracker {
    pub fn new() -> Self {
        let records = Source::ALL
            .into_iter()
            .map(|s| (s, SourceHealthRecord::default()))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }

    fn with_record<R>(&self, source: Source, f: impl FnOnce(&mut SourceHealthRecord) -> R) -> R {
        let mut guard = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let rec = guard.entry(source).or_default();
        let out = f(rec);
        publish_source_gauges(source, rec);
        out
    }

    pub fn on_start(&self, source: Source, now: DateTime<Utc>) {
        self.with_record(source, |r| {
            r.total_runs += 1;
            r.last_run = Some(now);
            if r.first_run_at.is_none() {
                r.first_run_at = Some(now);
            }
        });
    }

    pub fn on_success(&self, source: Source, added: u64, now: DateTime<Utc>) {
        self.with_record(source, |r| {
            r.last_success = Some(now);
            r.last_added_count = added;
            r.total_added += added;
            r.consecutive_failures = 0;
            if added > 0 {
                r.consecutive_zero_runs = 0;
                r.last_non_zero_at = Some(now);
            } else {
                r.consecutive_zero_runs += 1;
            }
        });
    }

    pub fn on_failure(&self, source: Source, error: &str, now: DateTime<Utc>) {
        self.with_record(source, |r| {
            r.last_error = Some(error.to_string());
            r.last_error_at = Some(now);
            r.consecutive_failures += 1;
            r.total_failures += 1;
        });
    }

    /// Fires at most once per baseline period. The baseline is the last non-zero
    /// run (or the first run) and only moves when the source yields again.
    pub fn maybe_alert(
        &self,
        source: Source,
        threshold_days: i64,
        now: DateTime<Utc>,
    ) -> Option<ZeroAlert> {
        self.with_record(source, |r| {
            let baseline = r.last_non_zero_at.or(r.first_run_at)?;
            let days_without_new = (now.date_naive() - baseline.date_naive()).num_days();
            let already_alerted = r.last_zero_alert_at.is_some_and(|at| at >= baseline);
            if days_without_new < threshold_days || already_alerted {
                return None;
            }
            r.last_zero_alert_at = Some(now);
            Some(ZeroAlert {
                source,
                days_without_new,
                threshold_days,
            })
        })
    }

    pub fn record(&self, source: Source) -> SourceHealthRecord {
        let guard = self.records.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(&source).cloned().unwrap_or_default()
    }

    /// Copy of all records ordered by source id.
    pub fn snapshot(&self) -> Vec<(Source, SourceHealthRecord)> {
        let guard = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = guard.iter().map(|(s, r)| (*s, r.clone())).collect();
        out.sort_by_key(|(s, _)| s.id());
        out
    }
}
