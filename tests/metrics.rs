// tests/metrics.rs
//
// The Prometheus recorder is process-global, so this binary installs it once.

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::ServiceExt;

use branding_sync::health::SourceHealthTracker;
use branding_sync::metrics::{Counter, Metrics, SyncCounters};
use branding_sync::types::Source;

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let metrics = Metrics::install().expect("install recorder");

    let counters = SyncCounters::new();
    counters.incr(Counter::SyncRuns);
    let health = SourceHealthTracker::new();
    health.on_start(Source::TheDrum, Utc::now());

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for c in Counter::ALL {
        assert!(text.contains(c.metric_name()), "missing {}", c.metric_name());
    }
    for series in [
        "branding_source_total_runs",
        "branding_source_total_added",
        "branding_source_total_failures",
        "branding_source_consecutive_zero_runs",
        "branding_source_last_success_timestamp",
        "branding_source_last_run_timestamp",
    ] {
        assert!(text.contains(series), "missing {series}");
    }
    assert!(text.contains(r#"source="The Drum""#));
    assert!(text.contains(r#"source="Forbes CMO Network""#));
    assert_eq!(text, metrics.render());
}
