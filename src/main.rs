//! Branding sync service entrypoint.
//! Loads configuration, wires the pipeline worker and scheduler, and serves the
//! health, metrics and operator routes.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use branding_sync::{
    api::{create_router, AppState},
    config::AppConfig,
    health::SourceHealthTracker,
    metrics::{Metrics, SyncCounters},
    notify::{slack::SlackNotifier, telegram::TelegramNotifier, Notifier, NotifierMux},
    pipeline::SyncOrchestrator,
    scheduler::spawn_scheduler,
    sources::SourceRegistry,
    store::notion::NotionStore,
    worker::{spawn_pipeline_worker, DEFAULT_QUEUE_CAPACITY},
};

/// JSON lines when `LOG_FORMAT=json`, compact text otherwise.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("branding_sync=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

fn build_notifiers(cfg: &AppConfig, counters: Arc<SyncCounters>) -> NotifierMux {
    let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

    let telegram = TelegramNotifier::new(cfg.telegram_token.clone(), cfg.chat_id.clone())
        .with_timeout(cfg.http_timeout_secs);
    if telegram.is_configured() {
        channels.push(Box::new(telegram));
    } else {
        warn!("telegram_notifier_disabled");
    }

    let slack = SlackNotifier::new(cfg.slack_webhook_url.clone()).with_timeout(cfg.http_timeout_secs);
    if slack.is_configured() {
        channels.push(Box::new(slack));
    }

    let mux = NotifierMux::new(channels, counters);
    if mux.is_empty() {
        warn!("no_notification_channels_configured");
    }
    mux
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env().context("load configuration")?;
    let metrics = Metrics::install()?;

    let counters = Arc::new(SyncCounters::new());
    let health = Arc::new(SourceHealthTracker::new());
    let store = Arc::new(NotionStore::new(
        cfg.notion_token.clone(),
        cfg.notion_database_id.clone(),
        cfg.http_timeout_secs,
    ));
    if !cfg.notion_configured() {
        warn!("notion_store_not_configured");
    }
    let notifier = Arc::new(build_notifiers(&cfg, counters.clone()));

    let orchestrator = Arc::new(SyncOrchestrator::new(
        SourceRegistry::live(&cfg),
        store.clone(),
        notifier,
        health.clone(),
        counters.clone(),
        cfg.thresholds.clone(),
    ));
    let (pipeline, _worker) = spawn_pipeline_worker(orchestrator, DEFAULT_QUEUE_CAPACITY);
    let _schedules = spawn_scheduler(pipeline.clone(), cfg.schedule);

    let state = AppState {
        pipeline,
        store,
        health,
        counters,
        digest_lookback_days: cfg.digest_lookback_days,
        digest_top_per_source: cfg.digest_top_per_source,
        started_at: Utc::now(),
    };
    let app = create_router(state, Some(&metrics));

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(%addr, "service_started");

    axum::serve(listener, app).await.context("http server")?;
    Ok(())
}
