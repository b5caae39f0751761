// tests/aggregate.rs
//
// Category aggregator: fan-out, partial failure, timeouts, ordering, dedup.

mod common;

use std::time::Duration;

use common::{add, calls, item, nz, Behavior, MockAdapter};
use news_aggregator::{Aggregator, CacheKey, Category, SourceRegistry};

fn aggregator(reg: SourceRegistry) -> Aggregator {
    Aggregator::new(reg, Duration::from_millis(300), Duration::from_secs(2))
}

#[tokio::test]
async fn merges_sorts_newest_first_dedups_and_truncates() {
    let mut reg = SourceRegistry::new();
    add(
        &mut reg,
        Category::Technology,
        MockAdapter::new(
            "alpha",
            Behavior::Items(vec![
                item("Old", "https://a.example/old", "Mon, 03 Mar 2025 08:00:00 GMT"),
                item("Shared", "https://shared.example/story", "Tue, 04 Mar 2025 08:00:00 GMT"),
            ]),
        ),
    );
    add(
        &mut reg,
        Category::Technology,
        MockAdapter::new(
            "beta",
            Behavior::Items(vec![
                item("Newest", "https://b.example/new", "Wed, 05 Mar 2025 08:00:00 GMT"),
                // same canonical link as alpha's item
                item("Shared again", "https://shared.example/story/", "Tue, 04 Mar 2025 09:00:00 GMT"),
            ]),
        ),
    );
    // other categories never leak into a category round
    add(
        &mut reg,
        Category::Sports,
        MockAdapter::new("gamma", Behavior::Items(vec![item("Match", "https://g.example/m", "Thu, 06 Mar 2025 08:00:00 GMT")])),
    );

    let res = aggregator(reg)
        .aggregate(CacheKey::Category(Category::Technology), nz(10))
        .await
        .unwrap();

    assert_eq!(res.sources_attempted, 2);
    assert_eq!(res.sources_succeeded, 2);
    assert!(res.source_errors.is_empty());
    assert_eq!(res.articles.len(), 3, "duplicate link collapses to one article");

    let titles: Vec<_> = res.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles[0], "Newest");
    assert_eq!(titles[2], "Old");
    assert!(res
        .articles
        .windows(2)
        .all(|w| w[0].timestamp >= w[1].timestamp));
    assert!(res.articles.iter().all(|a| a.category == Category::Technology));

    let mut reg = SourceRegistry::new();
    add(
        &mut reg,
        Category::Technology,
        MockAdapter::new(
            "many",
            Behavior::Items(
                (0..8)
                    .map(|i| item(&format!("n{i}"), &format!("https://m.example/{i}"), &format!("2025-03-0{}", i + 1)))
                    .collect(),
            ),
        ),
    );
    let res = aggregator(reg).aggregate(CacheKey::All, nz(3)).await.unwrap();
    let titles: Vec<_> = res.articles.iter().map(|a| a.title.as_str()).collect();
    assert_eq!(titles, vec!["n7", "n6", "n5"]);
}

#[tokio::test]
async fn failures_are_recorded_not_fatal() {
    let mut reg = SourceRegistry::new();
    add(&mut reg, Category::Health, MockAdapter::new("ok", Behavior::Numbered));
    add(&mut reg, Category::Health, MockAdapter::new("down", Behavior::Fail));
    add(&mut reg, Category::Health, MockAdapter::new("boom", Behavior::Panic));

    let res = aggregator(reg)
        .aggregate(CacheKey::Category(Category::Health), nz(10))
        .await
        .unwrap();
    assert_eq!(res.articles.len(), 1);
    assert_eq!(res.sources_succeeded, 1);
    assert_eq!(res.source_errors.len(), 2);
    assert_eq!(res.source_errors["down"], "unexpected status 503");
    assert_eq!(res.source_errors["boom"], "adapter panicked");
    assert!(!res.all_failed());
}

#[tokio::test]
async fn every_source_failing_yields_empty_result_with_errors() {
    let mut reg = SourceRegistry::new();
    add(&mut reg, Category::Science, MockAdapter::new("a", Behavior::Fail));
    add(&mut reg, Category::Science, MockAdapter::new("b", Behavior::Fail));

    let res = aggregator(reg).aggregate(CacheKey::All, nz(10)).await.unwrap();
    assert!(res.articles.is_empty());
    assert_eq!(res.source_errors.len(), 2);
    assert!(res.all_failed());
}

#[tokio::test]
async fn slow_source_times_out_alone() {
    let mut reg = SourceRegistry::new();
    let fast = add(&mut reg, Category::Sports, MockAdapter::new("fast", Behavior::Numbered));
    add(&mut reg, Category::Sports, MockAdapter::new("stuck", Behavior::Hang));

    let started = std::time::Instant::now();
    let res = Aggregator::new(reg, Duration::from_millis(100), Duration::from_secs(5))
        .aggregate(CacheKey::Category(Category::Sports), nz(10))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(calls(&fast), 1);
    assert_eq!(res.articles.len(), 1);
    assert!(res.source_errors["stuck"].starts_with("timed out"));
}

#[tokio::test]
async fn round_deadline_cuts_off_pending_sources() {
    let mut reg = SourceRegistry::new();
    add(&mut reg, Category::Science, MockAdapter::new("quick", Behavior::Numbered));
    add(&mut reg, Category::Science, MockAdapter::new("slow", Behavior::Hang));

    let res = Aggregator::new(reg, Duration::from_secs(10), Duration::from_millis(150))
        .aggregate(CacheKey::All, nz(10))
        .await
        .unwrap();
    assert_eq!(res.articles.len(), 1);
    assert_eq!(res.source_errors["slow"], "aggregation deadline exceeded");
}

#[tokio::test]
async fn key_without_sources_is_an_empty_round() {
    let mut reg = SourceRegistry::new();
    let s = add(&mut reg, Category::Sports, MockAdapter::new("s", Behavior::Numbered));
    let res = aggregator(reg)
        .aggregate(CacheKey::Category(Category::Health), nz(10))
        .await
        .unwrap();
    assert!(res.articles.is_empty());
    assert_eq!(res.sources_attempted, 0);
    assert!(!res.all_failed());
    assert_eq!(calls(&s), 0);

    // only a registry with nothing in it is fatal
    let err = aggregator(SourceRegistry::new())
        .aggregate(CacheKey::Category(Category::Health), nz(10))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Health"));
}
