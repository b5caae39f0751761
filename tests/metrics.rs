// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global.

mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{add, test_config, Behavior, MockAdapter, BODY_LIMIT};
use news_aggregator::metrics::Metrics;
use news_aggregator::{router, state_with_registry, Category, SourceRegistry};

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let mut reg = SourceRegistry::new();
    add(&mut reg, Category::Technology, MockAdapter::new("ok", Behavior::Numbered));
    add(&mut reg, Category::Technology, MockAdapter::new("down", Behavior::Fail));
    let sources = reg.len();

    let metrics = Metrics::init(sources).expect("recorder installs once");
    let app = router(state_with_registry(test_config(), reg)).merge(metrics.router());

    // one miss then one hit
    for _ in 0..2 {
        let resp = app
            .clone()
            .oneshot(Request::get("/api/articles").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for series in [
        "registered_sources 2",
        "cache_misses_total 1",
        "cache_hits_total 1",
        "scrape_rounds_total{key=\"all\"} 1",
        "source_errors_total{kind=\"status\"} 1",
        "aggregate_ms",
        "cache_last_refresh_ts",
    ] {
        assert!(text.contains(series), "missing series '{series}' in:\n{text}");
    }
}
