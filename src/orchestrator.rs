// src/orchestrator.rs
//! Scrape orchestrator: the only entry point into aggregation.
//!
//! Each cache key has an async mutex that acts as its one-fetch-in-flight
//! guard (`Idle -> Fetching -> Idle`). Callers that find a key empty, or that
//! force a refresh, queue on that guard; whoever gets it first runs the round
//! and everyone queued behind it is handed the freshly cached result instead of
//! starting a second round.
//!
//! Rounds run on a spawned task that owns the guard, so a caller going away
//! (e.g. an HTTP client disconnecting) never cancels a round halfway.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::aggregate::{Aggregator, ScrapeResult};
use crate::article::{Article, CacheKey, Category};
use crate::cache::{CacheEntry, CacheStore};
use crate::error::AggregateError;

/// How a read was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Served from an existing entry.
    Hit,
    /// This caller ran the aggregation.
    Miss,
    /// Waited on another caller's in-flight aggregation and got its result.
    Joined,
}

impl CacheStatus {
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Joined => "JOINED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Served {
    pub result: Arc<ScrapeResult>,
    pub cache: CacheStatus,
    pub refreshed_at: DateTime<Utc>,
    pub generation: u64,
}

impl Served {
    fn from_entry(e: CacheEntry, cache: CacheStatus) -> Self {
        Self {
            result: e.result,
            cache,
            refreshed_at: e.last_refreshed_at,
            generation: e.generation,
        }
    }
}

/// Clears the refreshing flag however the round ends.
struct RefreshingFlag {
    cache: Arc<CacheStore>,
    key: CacheKey,
}

impl RefreshingFlag {
    fn set(cache: Arc<CacheStore>, key: CacheKey) -> Self {
        cache.mark_refreshing(key);
        Self { cache, key }
    }
}

impl Drop for RefreshingFlag {
    fn drop(&mut self) {
        self.cache.clear_refreshing(self.key);
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    cache: Arc<CacheStore>,
    aggregator: Arc<Aggregator>,
    guards: Arc<HashMap<CacheKey, Arc<Mutex<()>>>>,
    limit: NonZeroUsize,
}

impl Orchestrator {
    /// `limit` is how many articles each round keeps per key.
    pub fn new(cache: Arc<CacheStore>, aggregator: Arc<Aggregator>, limit: NonZeroUsize) -> Self {
        let guards = CacheKey::all_keys()
            .map(|k| (k, Arc::new(Mutex::new(()))))
            .collect();
        Self {
            cache,
            aggregator,
            guards: Arc::new(guards),
            limit,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    async fn lock(&self, key: CacheKey) -> OwnedMutexGuard<()> {
        // every CacheKey is inserted in `new`
        self.guards[&key].clone().lock_owned().await
    }

    /// Serve `key` from cache; aggregate once if it was never populated.
    pub async fn read_or_populate(&self, key: CacheKey) -> Result<Served, AggregateError> {
        if let Some(e) = self.cache.get(key) {
            counter!("cache_hits_total").increment(1);
            return Ok(Served::from_entry(e, CacheStatus::Hit));
        }

        let guard = self.lock(key).await;
        if let Some(e) = self.cache.get(key) {
            counter!("cache_joined_total").increment(1);
            debug!(target: "orchestrator", %key, "joined in-flight aggregation");
            return Ok(Served::from_entry(e, CacheStatus::Joined));
        }

        counter!("cache_misses_total").increment(1);
        let e = self.run_locked(key, guard).await?;
        Ok(Served::from_entry(e, CacheStatus::Miss))
    }

    /// Aggregate `key` regardless of cache state and overwrite its entry. A round
    /// for the same key that finishes while this caller waits is returned as is.
    pub async fn force_refresh(&self, key: CacheKey) -> Result<Served, AggregateError> {
        let seen = self.cache.generation(key);
        let guard = self.lock(key).await;
        if self.cache.generation(key) > seen {
            if let Some(e) = self.cache.get(key) {
                counter!("cache_joined_total").increment(1);
                return Ok(Served::from_entry(e, CacheStatus::Joined));
            }
        }

        info!(target: "orchestrator", %key, "forced refresh");
        let e = self.run_locked(key, guard).await?;
        Ok(Served::from_entry(e, CacheStatus::Miss))
    }

    /// Refresh every category, then rebuild the "all" entry from their merged
    /// results so each source is fetched once.
    pub async fn refresh_everything(&self) -> Result<Served, AggregateError> {
        let this = self.clone();
        tokio::spawn(async move { this.refresh_everything_inner().await })
            .await
            .map_err(|e| AggregateError::Task(e.to_string()))?
    }

    async fn refresh_everything_inner(&self) -> Result<Served, AggregateError> {
        let seen_all = self.cache.generation(CacheKey::All);
        let _all_guard = self.lock(CacheKey::All).await;
        if self.cache.generation(CacheKey::All) > seen_all {
            if let Some(e) = self.cache.get(CacheKey::All) {
                return Ok(Served::from_entry(e, CacheStatus::Joined));
            }
        }
        if self.aggregator.registry().is_empty() {
            return Err(AggregateError::NoSources(CacheKey::All.to_string()));
        }
        let _flag = RefreshingFlag::set(self.cache.clone(), CacheKey::All);

        let rounds = futures::future::join_all(
            Category::ALL.map(|c| self.force_refresh(CacheKey::Category(c))),
        )
        .await;

        let mut parts = Vec::with_capacity(rounds.len());
        for r in rounds {
            parts.push(r?.result);
        }

        let merged = ScrapeResult::merge(parts.iter().map(|p| p.as_ref()), self.limit);
        let e = self.cache.put(CacheKey::All, merged);
        info!(
            target: "orchestrator",
            generation = e.generation,
            count = e.result.articles.len(),
            "refreshed every key"
        );
        Ok(Served::from_entry(e, CacheStatus::Miss))
    }

    /// Run one round for `key` while holding its guard, then write the cache.
    async fn run_locked(
        &self,
        key: CacheKey,
        guard: OwnedMutexGuard<()>,
    ) -> Result<CacheEntry, AggregateError> {
        let cache = self.cache.clone();
        let aggregator = self.aggregator.clone();
        let limit = self.limit;

        let task = tokio::spawn(async move {
            let _guard = guard;
            let _flag = RefreshingFlag::set(cache.clone(), key);
            let result = aggregator.aggregate(key, limit).await?;
            // empty results are cached too
            Ok::<_, AggregateError>(cache.put(key, result))
        });
        task.await
            .map_err(|e| AggregateError::Task(e.to_string()))?
    }

    /// Look `id` up across cached entries, populating "all" once if nothing
    /// has been cached yet.
    pub async fn find_article(&self, id: &str) -> Result<Option<Article>, AggregateError> {
        if !CacheKey::all_keys().any(|k| self.cache.has(k)) {
            self.read_or_populate(CacheKey::All).await?;
        }
        let keys = std::iter::once(CacheKey::All).chain(Category::ALL.map(CacheKey::Category));
        for key in keys {
            if let Some(e) = self.cache.get(key) {
                if let Some(a) = e.result.articles.iter().find(|a| a.id == id) {
                    return Ok(Some(a.clone()));
                }
            }
        }
        Ok(None)
    }
}
