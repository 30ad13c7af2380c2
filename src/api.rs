use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::health::SourceHealthTracker;
use crate::metrics::{Metrics, SyncCounters};
use crate::pipeline::{SyncRequest, SyncTarget};
use crate::report;
use crate::store::RecordStore;
use crate::worker::PipelineHandle;

pub const LIVENESS_TEXT: &str = "Branding Scraper is Live and Healthy";
pub const DEFAULT_SYNC_DAYS: i64 = 2;
pub const DEFAULT_ENTRIES_LIMIT: usize = 10;
pub const DEFAULT_EXPORT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;
pub const SEARCH_LIMIT: usize = 20;
pub const SEARCH_MAX_PAGES: usize = 6;
pub const DIGEST_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: PipelineHandle,
    pub store: Arc<dyn RecordStore>,
    pub health: Arc<SourceHealthTracker>,
    pub counters: Arc<SyncCounters>,
    pub digest_lookback_days: i64,
    pub digest_top_per_source: usize,
    pub started_at: DateTime<Utc>,
}

/// Operator routes plus liveness; `/metrics` is merged in when a recorder is installed.
pub fn create_router(state: AppState, metrics: Option<&Metrics>) -> Router {
    let app = Router::new()
        .route("/", get(|| async { LIVENESS_TEXT }))
        .route("/health", get(|| async { LIVENESS_TEXT }))
        .route("/status", get(status))
        .route("/sync", post(sync))
        .route("/entries", get(entries))
        .route("/search", get(search))
        .route("/export", get(export))
        .route("/digest", get(digest))
        .layer(CorsLayer::very_permissive())
        .with_state(state);

    match metrics {
        Some(m) => app.merge(m.router()),
        None => app,
    }
}

fn store_failure(e: StoreError) -> Response {
    warn!(error = %e, "operator_store_query_failed");
    let status = match e {
        StoreError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string()).into_response()
}

fn clamp_limit(limit: Option<usize>, default: usize) -> usize {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

async fn status(State(state): State<AppState>) -> String {
    report::format_status_message(
        state.started_at,
        Utc::now(),
        &state.counters.snapshot(),
        &state.health.snapshot(),
    )
}

#[derive(serde::Deserialize)]
struct SyncParams {
    source: Option<u8>,
    #[serde(default)]
    days: Option<i64>,
}

#[derive(serde::Serialize)]
struct SyncResp {
    added: u64,
    errors: Vec<String>,
    message: String,
}

fn sync_summary(added: u64, errors: &[String]) -> String {
    if !errors.is_empty() {
        let summary = errors.iter().take(2).cloned().collect::<Vec<_>>().join("; ");
        format!("Finished with errors. Added {added} new articles.\nErrors: {summary}")
    } else if added == 0 {
        "No new articles found for this timeframe.".to_string()
    } else {
        format!("Finished. Added {added} new articles.")
    }
}

async fn sync(State(state): State<AppState>, Query(q): Query<SyncParams>) -> Response {
    let Some(target) = q.source.and_then(SyncTarget::from_id) else {
        return (StatusCode::BAD_REQUEST, "source must be 0 (all) or 1..=6").into_response();
    };
    let days = q.days.unwrap_or(DEFAULT_SYNC_DAYS);
    if days < 0 {
        return (StatusCode::BAD_REQUEST, "days must be >= 0").into_response();
    }

    info!(target = ?target, days, "manual_sync_requested");
    match state.pipeline.submit(SyncRequest::new(target, days, "manual")).await {
        Ok(r) => Json(SyncResp {
            message: sync_summary(r.added, &r.errors),
            added: r.added,
            errors: r.errors,
        })
        .into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

#[derive(serde::Deserialize)]
struct LimitParams {
    limit: Option<usize>,
}

async fn entries(State(state): State<AppState>, Query(q): Query<LimitParams>) -> Response {
    let limit = clamp_limit(q.limit, DEFAULT_ENTRIES_LIMIT);
    match state.store.recent(limit).await {
        Ok(rows) => report::format_recent_entries_message(&rows, limit).into_response(),
        Err(e) => store_failure(e),
    }
}

#[derive(serde::Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(State(state): State<AppState>, Query(p): Query<SearchParams>) -> Response {
    let term = p.q.trim().to_string();
    if term.is_empty() {
        return (StatusCode::BAD_REQUEST, "Usage: /search?q=<keyword>").into_response();
    }
    match state.store.scan(SEARCH_MAX_PAGES).await {
        Ok(rows) => {
            let hits = report::search_entries(&rows, &term, SEARCH_LIMIT);
            report::format_search_results_message(&term, &hits, SEARCH_LIMIT).into_response()
        }
        Err(e) => store_failure(e),
    }
}

#[derive(serde::Deserialize)]
struct ExportParams {
    #[serde(default)]
    format: Option<String>,
    limit: Option<usize>,
}

async fn export(State(state): State<AppState>, Query(p): Query<ExportParams>) -> Response {
    let format = p.format.as_deref().unwrap_or("md").to_ascii_lowercase();
    if format != "md" && format != "csv" {
        return (StatusCode::BAD_REQUEST, "format must be md or csv").into_response();
    }
    let limit = clamp_limit(p.limit, DEFAULT_EXPORT_LIMIT);
    let rows = match state.store.recent(limit).await {
        Ok(rows) => rows,
        Err(e) => return store_failure(e),
    };
    if rows.is_empty() {
        return (StatusCode::NOT_FOUND, "No entries available to export.").into_response();
    }

    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let (body, content_type) = if format == "md" {
        (
            report::entries_to_markdown(&rows, &format!("Branding Recent Entries ({})", rows.len())),
            "text/markdown; charset=utf-8",
        )
    } else {
        (report::entries_to_csv(&rows), "text/csv; charset=utf-8")
    };
    let disposition = format!(
        "attachment; filename=\"branding_recent_{}_{stamp}.{format}\"",
        rows.len()
    );
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

async fn digest(State(state): State<AppState>) -> Response {
    let days = state.digest_lookback_days.max(1);
    let start = Utc::now().date_naive() - Duration::days(days);
    match state.store.since(start, DIGEST_PAGE_SIZE).await {
        Ok(rows) => {
            report::format_weekly_digest_message(&rows, days, state.digest_top_per_source).into_response()
        }
        Err(e) => store_failure(e),
    }
}
