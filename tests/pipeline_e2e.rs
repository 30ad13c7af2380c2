// tests/pipeline_e2e.rs
//
// Orchestrator runs against in-process fakes: canned fetchers, an extractor that
// never reaches the network, the in-memory store and a recording notifier.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};

use branding_sync::config::AlertThresholds;
use branding_sync::content::ContentExtractor;
use branding_sync::error::FetchError;
use branding_sync::health::SourceHealthTracker;
use branding_sync::metrics::{Counter, SyncCounters};
use branding_sync::notify::{NotifierMux, RecordingNotifier};
use branding_sync::pipeline::{SyncOrchestrator, SyncRequest, SyncTarget};
use branding_sync::sources::{Fetcher, SourceRegistry};
use branding_sync::store::memory::{InMemoryStore, WriteBehavior};
use branding_sync::types::{Article, ContentBlock, Source};

struct CannedFetcher {
    source: Source,
    result: Result<Vec<Article>, String>,
}

#[async_trait]
impl Fetcher for CannedFetcher {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self, _start: NaiveDate, _end: NaiveDate) -> Result<Vec<Article>, FetchError> {
        self.result
            .clone()
            .map_err(|m| FetchError::transport(self.source.name(), m))
    }
}

/// Always hands back an empty page, so content comes from the metadata fallback.
struct OfflineExtractor;

#[async_trait]
impl ContentExtractor for OfflineExtractor {
    async fn fetch_page(&self, _url: &str) -> Result<String, FetchError> {
        Ok(String::new())
    }

    fn extract_blocks(&self, _page: &str, _url: &str) -> Vec<ContentBlock> {
        Vec::new()
    }
}

struct Harness {
    orchestrator: SyncOrchestrator,
    store: Arc<InMemoryStore>,
    notifier: RecordingNotifier,
    counters: Arc<SyncCounters>,
    health: Arc<SourceHealthTracker>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn article(title: &str, link: &str, source: Source) -> Article {
    Article::new(title, link, today(), source)
}

fn ok(source: Source, articles: Vec<Article>) -> Arc<dyn Fetcher> {
    Arc::new(CannedFetcher {
        source,
        result: Ok(articles),
    })
}

fn failing(source: Source, message: &str) -> Arc<dyn Fetcher> {
    Arc::new(CannedFetcher {
        source,
        result: Err(message.to_string()),
    })
}

fn harness(fetchers: Vec<Arc<dyn Fetcher>>, store: InMemoryStore) -> Harness {
    let mut registry = SourceRegistry::new();
    for f in fetchers {
        registry.register(f, Arc::new(OfflineExtractor));
    }
    let store = Arc::new(store);
    let counters = Arc::new(SyncCounters::new());
    let health = Arc::new(SourceHealthTracker::new());
    let notifier = RecordingNotifier::new();
    let mux = NotifierMux::new(vec![Box::new(notifier.clone())], counters.clone());
    let orchestrator = SyncOrchestrator::new(
        registry,
        store.clone(),
        Arc::new(mux),
        health.clone(),
        counters.clone(),
        AlertThresholds::default(),
    );
    Harness {
        orchestrator,
        store,
        notifier,
        counters,
        health,
    }
}

fn one(source: Source, days: i64) -> SyncRequest {
    SyncRequest::new(SyncTarget::One(source), days, "manual")
}

#[tokio::test]
async fn three_raw_articles_with_a_shared_url_create_exactly_one_record() {
    let h = harness(
        vec![ok(
            Source::BrandNew,
            vec![
                article("Old Logo, New Look", "http://brand.test/logo/?utm_source=rss", Source::BrandNew),
                article("Old Logo, New Look (again)", "https://brand.test/logo", Source::BrandNew),
                article("Fresh Identity for a Museum", "https://brand.test/museum", Source::BrandNew),
            ],
        )],
        InMemoryStore::new().with_existing(["https://brand.test/logo"]),
    );

    let report = h.orchestrator.run(&one(Source::BrandNew, 2)).await;

    assert_eq!(report.added, 1);
    assert!(report.errors.is_empty());
    assert_eq!(h.store.create_attempts(), 1);
    assert_eq!(h.counters.get(Counter::DuplicateSkippedBatch), 1);
    assert_eq!(h.counters.get(Counter::DuplicateSkippedStore), 1);
    assert_eq!(h.counters.get(Counter::ArticlesUploaded), 1);

    let pages = h.store.pages();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].article.link, "https://brand.test/museum");
    assert!(!pages[0].blocks.is_empty());

    assert_eq!(
        h.notifier.messages(),
        vec!["Articles were added to the database (1 from Brand New).".to_string()]
    );
    let rec = h.health.record(Source::BrandNew);
    assert_eq!(rec.last_added_count, 1);
    assert_eq!(rec.total_runs, 1);
}

#[tokio::test]
async fn same_url_from_two_sources_is_created_once_per_run() {
    let h = harness(
        vec![
            ok(
                Source::BrandingJournal,
                vec![article("Shared story about rebrands", "https://shared.test/story", Source::BrandingJournal)],
            ),
            ok(
                Source::TheDrum,
                vec![article("Shared story about rebrands", "https://shared.test/story?utm_campaign=x", Source::TheDrum)],
            ),
        ],
        InMemoryStore::new(),
    );

    let report = h
        .orchestrator
        .run(&SyncRequest::new(SyncTarget::All, 8, "manual"))
        .await;

    assert_eq!(report.added, 1);
    assert_eq!(h.store.create_attempts(), 1);
    assert_eq!(h.counters.get(Counter::DuplicateSkippedRuntime), 1);
    assert_eq!(
        h.notifier.messages(),
        vec!["Articles were added to the database (1 across all sources).".to_string()]
    );
}

#[tokio::test]
async fn separate_runs_do_not_share_run_state() {
    let h = harness(
        vec![ok(
            Source::Bpando,
            vec![article("Packaging for a tea brand", "https://bp.test/tea", Source::Bpando)],
        )],
        InMemoryStore::new(),
    );

    assert_eq!(h.orchestrator.run(&one(Source::Bpando, 8)).await.added, 1);
    // Second run: the run layer admits it again, the store layer catches it.
    assert_eq!(h.orchestrator.run(&one(Source::Bpando, 8)).await.added, 0);
    assert_eq!(h.counters.get(Counter::DuplicateSkippedRuntime), 0);
    assert_eq!(h.counters.get(Counter::DuplicateSkippedStore), 1);
}

#[tokio::test]
async fn articles_already_in_the_store_are_never_created() {
    let h = harness(
        vec![ok(
            Source::BrandingMag,
            vec![article("Known article in the store", "https://mag.test/known/", Source::BrandingMag)],
        )],
        InMemoryStore::new().with_existing(["https://mag.test/known/"]),
    );

    let report = h.orchestrator.run(&one(Source::BrandingMag, 8)).await;

    assert_eq!(report.added, 0);
    assert_eq!(h.store.create_attempts(), 0);
    assert_eq!(h.counters.get(Counter::DuplicateSkippedStore), 1);
}

#[tokio::test]
async fn unknown_existence_skips_the_article() {
    let h = harness(
        vec![ok(
            Source::TheDrum,
            vec![article("Agency wins global account", "https://drum.test/win", Source::TheDrum)],
        )],
        InMemoryStore::new().unavailable(),
    );

    let report = h.orchestrator.run(&one(Source::TheDrum, 8)).await;

    assert_eq!(report.added, 0);
    assert!(report.errors.is_empty());
    assert_eq!(h.store.exists_calls(), 1);
    assert_eq!(h.store.create_attempts(), 0);
    assert_eq!(h.counters.get(Counter::DedupeCheckUnavailable), 1);
    assert_eq!(h.counters.get(Counter::StoreQueryFailures), 1);
}

#[tokio::test]
async fn rejected_full_write_falls_back_to_metadata_only() {
    let h = harness(
        vec![ok(
            Source::ForbesCmo,
            vec![article("How CMOs plan budgets this year", "https://forbes.test/cmo", Source::ForbesCmo)],
        )],
        InMemoryStore::new().with_writes(WriteBehavior::RejectContent),
    );

    let report = h.orchestrator.run(&one(Source::ForbesCmo, 8)).await;

    assert_eq!(report.added, 1);
    assert_eq!(h.store.create_attempts(), 2);
    assert_eq!(h.counters.get(Counter::ArticlesUploaded), 1);
    assert_eq!(h.counters.get(Counter::StoreWriteFailures), 0);
    let pages = h.store.pages();
    assert_eq!(pages.len(), 1);
    assert!(pages[0].blocks.is_empty());
}

#[tokio::test]
async fn failed_writes_are_not_counted_as_added() {
    let h = harness(
        vec![ok(
            Source::BrandNew,
            vec![article("A logo nobody will see", "https://brand.test/lost", Source::BrandNew)],
        )],
        InMemoryStore::new().with_writes(WriteBehavior::TransportError),
    );

    let report = h.orchestrator.run(&one(Source::BrandNew, 2)).await;

    assert_eq!(report.added, 0);
    assert!(report.errors.is_empty());
    assert_eq!(h.store.create_attempts(), 1);
    assert_eq!(h.counters.get(Counter::ArticlesUploaded), 0);
    assert_eq!(h.counters.get(Counter::StoreWriteFailures), 1);
}

#[tokio::test]
async fn fetch_failure_records_health_and_alerts() {
    let h = harness(vec![failing(Source::TheDrum, "connection refused")], InMemoryStore::new());

    let report = h.orchestrator.run(&one(Source::TheDrum, 8).silent()).await;

    assert_eq!(report.added, 0);
    assert_eq!(
        report.errors,
        vec!["The Drum: Error fetching The Drum: connection refused".to_string()]
    );
    let rec = h.health.record(Source::TheDrum);
    assert_eq!(rec.consecutive_failures, 1);
    assert_eq!(rec.total_failures, 1);
    assert!(rec.last_success.is_none());
    assert_eq!(h.counters.get(Counter::SyncRunsFailure), 1);

    // The failure alert goes out even for silent runs.
    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("ALERT: Sync failed for The Drum (days=8, trigger=manual). Error: "));
}

#[tokio::test]
async fn one_failing_source_does_not_stop_the_others() {
    let h = harness(
        vec![
            failing(Source::BrandingJournal, "timed out"),
            ok(
                Source::Bpando,
                vec![article("New pack for a bakery chain", "https://bp.test/bakery", Source::Bpando)],
            ),
        ],
        InMemoryStore::new(),
    );

    let report = h
        .orchestrator
        .run(&SyncRequest::new(SyncTarget::All, 8, "manual"))
        .await;

    assert_eq!(report.added, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Branding Journal: "));

    let messages = h.notifier.messages();
    assert!(messages[0].starts_with("ALERT: Sync failed for Branding Journal"));
    assert!(messages.contains(&"Articles were added to the database (1 across all sources).".to_string()));
    assert!(messages
        .last()
        .is_some_and(|m| m.starts_with("One or more syncs failed: Branding Journal: ")));
}

#[tokio::test]
async fn silent_all_source_run_sends_no_summaries() {
    let h = harness(
        vec![ok(
            Source::Bpando,
            vec![article("Silent packaging update", "https://bp.test/silent", Source::Bpando)],
        )],
        InMemoryStore::new(),
    );

    let report = h
        .orchestrator
        .run(&SyncRequest::new(SyncTarget::All, 8, "manual").silent())
        .await;

    assert_eq!(report.added, 1);
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn zero_yield_alert_fires_once_per_baseline() {
    let h = harness(vec![ok(Source::BrandNew, Vec::new())], InMemoryStore::new());
    // First seen three days ago, nothing since.
    h.health.on_start(Source::BrandNew, Utc::now() - Duration::days(3));

    h.orchestrator.run(&one(Source::BrandNew, 2)).await;
    h.orchestrator.run(&one(Source::BrandNew, 2)).await;

    let alerts: Vec<_> = h
        .notifier
        .messages()
        .into_iter()
        .filter(|m| m.contains("zero new articles"))
        .collect();
    assert_eq!(
        alerts,
        vec!["ALERT: Brand New has produced zero new articles for 3 days. (threshold=2, trigger=manual)".to_string()]
    );
    assert_eq!(h.health.record(Source::BrandNew).consecutive_zero_runs, 2);
}

#[tokio::test]
async fn zero_yield_below_threshold_is_quiet() {
    let h = harness(vec![ok(Source::TheDrum, Vec::new())], InMemoryStore::new());
    h.health.on_start(Source::TheDrum, Utc::now() - Duration::days(3));

    h.orchestrator.run(&one(Source::TheDrum, 8)).await;

    // Weekly sources wait 14 days.
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn unregistered_source_reports_an_error() {
    let h = harness(Vec::new(), InMemoryStore::new());
    let report = h.orchestrator.run(&one(Source::ForbesCmo, 8)).await;
    assert_eq!(report.added, 0);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(h.store.create_attempts(), 0);
}
