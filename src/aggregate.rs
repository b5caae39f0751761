// src/aggregate.rs
//! Category aggregator: concurrent fan-out over the registered sources with a
//! per-source timeout and a deadline for the whole round.

use chrono::Utc;
use futures::FutureExt;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::article::{Article, CacheKey};
use crate::error::{AggregateError, SourceError};
use crate::ingest::registry::{RegisteredSource, SourceRegistry};
use crate::ingest::{ensure_metrics_described, normalize};

/// Outcome of one aggregation round. Partial failure is data, not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    /// Deduplicated by id, newest first.
    pub articles: Vec<Article>,
    /// Source id → failure reason.
    pub source_errors: BTreeMap<String, String>,
    pub sources_attempted: usize,
    pub sources_succeeded: usize,
}

impl ScrapeResult {
    /// At least one source ran and none delivered.
    pub fn all_failed(&self) -> bool {
        self.sources_attempted > 0 && self.sources_succeeded == 0
    }

    /// Union of several rounds, deduplicated, re-sorted and cut to `limit`.
    pub fn merge<'a>(parts: impl IntoIterator<Item = &'a ScrapeResult>, limit: NonZeroUsize) -> Self {
        let mut out = ScrapeResult::default();
        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        for p in parts {
            out.sources_attempted += p.sources_attempted;
            out.sources_succeeded += p.sources_succeeded;
            out.source_errors
                .extend(p.source_errors.iter().map(|(k, v)| (k.clone(), v.clone())));
            for a in &p.articles {
                if seen.insert(a.id.clone()) {
                    articles.push(a.clone());
                }
            }
        }
        out.articles = sort_and_truncate(articles, limit);
        out
    }
}

/// Stable sort newest first, then cut.
fn sort_and_truncate(mut articles: Vec<Article>, limit: NonZeroUsize) -> Vec<Article> {
    articles.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    articles.truncate(limit.get());
    articles
}

pub struct Aggregator {
    registry: SourceRegistry,
    source_timeout: Duration,
    total_timeout: Duration,
}

impl Aggregator {
    pub fn new(registry: SourceRegistry, source_timeout: Duration, total_timeout: Duration) -> Self {
        Self {
            registry,
            source_timeout,
            total_timeout,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Fetch every source registered for `key` and merge the results.
    ///
    /// Articles are taken in arrival order, deduplicated by id (first seen
    /// wins), sorted by timestamp descending and cut to `limit`. Sources that
    /// fail, time out, panic, or are still running at the deadline end up in
    /// `source_errors`. A key without sources yields an empty result; only an
    /// empty registry is an error.
    pub async fn aggregate(
        &self,
        key: CacheKey,
        limit: NonZeroUsize,
    ) -> Result<ScrapeResult, AggregateError> {
        ensure_metrics_described();
        if self.registry.is_empty() {
            return Err(AggregateError::NoSources(key.to_string()));
        }
        let sources = self.registry.for_key(key);
        if sources.is_empty() {
            // a category nobody publishes to is an empty feed, not a failure
            info!(target: "aggregate", %key, "no sources registered for key");
            counter!("scrape_rounds_total", "key" => key.as_str()).increment(1);
            return Ok(ScrapeResult::default());
        }

        let t0 = Instant::now();
        let deadline = tokio::time::Instant::now() + self.total_timeout;
        let attempted = sources.len();
        let mut pending: BTreeSet<String> = sources.iter().map(|s| s.id.clone()).collect();

        let mut set = JoinSet::new();
        for src in sources {
            let per_source = self.source_timeout;
            set.spawn(async move {
                let outcome = fetch_source(&src, per_source).await;
                (src.id, outcome)
            });
        }

        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        let mut source_errors = BTreeMap::new();
        let mut succeeded = 0usize;
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, set.join_next()).await {
                Ok(None) => break,
                Ok(Some(Ok((id, outcome)))) => {
                    pending.remove(&id);
                    match outcome {
                        Ok(list) => {
                            succeeded += 1;
                            for a in list {
                                if seen.insert(a.id.clone()) {
                                    articles.push(a);
                                }
                            }
                        }
                        Err(e) => {
                            record_source_error(&mut source_errors, id, &e);
                        }
                    }
                }
                Ok(Some(Err(join_err))) => {
                    // id unknown here; reported below from `pending`
                    warn!(target: "aggregate", error = %join_err, "source task failed");
                }
                Err(_) => {
                    deadline_hit = true;
                    set.abort_all();
                    break;
                }
            }
        }

        for id in pending {
            let e = if deadline_hit {
                SourceError::DeadlineExceeded
            } else {
                SourceError::Panicked
            };
            record_source_error(&mut source_errors, id, &e);
        }

        let articles = sort_and_truncate(articles, limit);
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("aggregate_ms").record(ms);
        counter!("scrape_rounds_total", "key" => key.as_str()).increment(1);

        info!(
            target: "aggregate",
            %key,
            attempted,
            succeeded,
            failed = source_errors.len(),
            kept = articles.len(),
            ms = ms as u64,
            "aggregation round finished"
        );

        Ok(ScrapeResult {
            articles,
            source_errors,
            sources_attempted: attempted,
            sources_succeeded: succeeded,
        })
    }
}

fn record_source_error(map: &mut BTreeMap<String, String>, id: String, e: &SourceError) {
    counter!("source_errors_total", "kind" => e.kind()).increment(1);
    warn!(target: "aggregate", source = %id, error = %e, "source failed");
    map.insert(id, e.to_string());
}

/// One source: fetch under its timeout, then normalize.
async fn fetch_source(src: &RegisteredSource, timeout: Duration) -> Result<Vec<Article>, SourceError> {
    let fut = AssertUnwindSafe(src.adapter.fetch(src.category)).catch_unwind();
    let raw = match tokio::time::timeout(timeout, fut).await {
        Err(_) => return Err(SourceError::Timeout(timeout)),
        Ok(Err(_panic)) => return Err(SourceError::Panicked),
        Ok(Ok(res)) => res?,
    };
    let now = Utc::now();
    let name = src.adapter.name();
    Ok(raw
        .iter()
        .map(|r| normalize(r, name, src.category, now))
        .collect())
}
