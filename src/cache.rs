// src/cache.rs
//! In-memory cache store. One slot per cache key, each behind its own lock, so a
//! write to one key never blocks readers of another. No TTL: entries live until
//! the next refresh overwrites them.

use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::aggregate::ScrapeResult;
use crate::article::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Never fetched.
    Empty,
    Populated,
    /// An aggregation for this key is in flight. Readers still get the
    /// previous value, if any.
    Refreshing,
}

/// Immutable snapshot of one key's latest aggregation.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: Arc<ScrapeResult>,
    pub last_refreshed_at: DateTime<Utc>,
    /// Bumped on every `put`; starts at 1.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct Slot {
    entry: Option<CacheEntry>,
    refreshing: bool,
    generation: u64,
}

/// Per-key status row for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub key: CacheKey,
    pub state: EntryState,
    pub count: usize,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub generation: u64,
}

#[derive(Debug)]
pub struct CacheStore {
    slots: HashMap<CacheKey, RwLock<Slot>>,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore {
    pub fn new() -> Self {
        let slots = CacheKey::all_keys()
            .map(|k| (k, RwLock::new(Slot::default())))
            .collect();
        Self { slots }
    }

    fn slot(&self, key: CacheKey) -> &RwLock<Slot> {
        // every CacheKey is inserted in `new`
        &self.slots[&key]
    }

    fn read<R>(&self, key: CacheKey, f: impl FnOnce(&Slot) -> R) -> R {
        let g = self.slot(key).read().unwrap_or_else(PoisonError::into_inner);
        f(&g)
    }

    fn write<R>(&self, key: CacheKey, f: impl FnOnce(&mut Slot) -> R) -> R {
        let mut g = self.slot(key).write().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    pub fn get(&self, key: CacheKey) -> Option<CacheEntry> {
        self.read(key, |s| s.entry.clone())
    }

    pub fn has(&self, key: CacheKey) -> bool {
        self.read(key, |s| s.entry.is_some())
    }

    pub fn state(&self, key: CacheKey) -> EntryState {
        self.read(key, |s| match (s.refreshing, &s.entry) {
            (true, _) => EntryState::Refreshing,
            (false, Some(_)) => EntryState::Populated,
            (false, None) => EntryState::Empty,
        })
    }

    /// 0 until the first `put`.
    pub fn generation(&self, key: CacheKey) -> u64 {
        self.read(key, |s| s.generation)
    }

    /// Replace the entry for `key` in one step and clear the refreshing flag.
    pub fn put(&self, key: CacheKey, result: ScrapeResult) -> CacheEntry {
        let now = Utc::now();
        let entry = self.write(key, |s| {
            s.generation += 1;
            let entry = CacheEntry {
                result: Arc::new(result),
                last_refreshed_at: now,
                generation: s.generation,
            };
            s.entry = Some(entry.clone());
            s.refreshing = false;
            entry
        });
        gauge!("cache_last_refresh_ts").set(now.timestamp() as f64);
        entry
    }

    pub fn mark_refreshing(&self, key: CacheKey) {
        self.write(key, |s| s.refreshing = true);
    }

    pub fn clear_refreshing(&self, key: CacheKey) {
        self.write(key, |s| s.refreshing = false);
    }

    pub fn snapshot(&self) -> Vec<KeyStatus> {
        CacheKey::all_keys()
            .map(|key| {
                let state = self.state(key);
                self.read(key, |s| KeyStatus {
                    key,
                    state,
                    count: s.entry.as_ref().map_or(0, |e| e.result.articles.len()),
                    last_refreshed_at: s.entry.as_ref().map(|e| e.last_refreshed_at),
                    generation: s.generation,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::Category;

    #[test]
    fn empty_then_populated_then_overwritten() {
        let c = CacheStore::new();
        let k = CacheKey::Category(Category::Health);
        assert_eq!(c.state(k), EntryState::Empty);
        assert!(!c.has(k));
        assert_eq!(c.generation(k), 0);

        c.mark_refreshing(k);
        assert_eq!(c.state(k), EntryState::Refreshing);

        let e1 = c.put(k, ScrapeResult::default());
        assert_eq!(c.state(k), EntryState::Populated);
        assert_eq!(e1.generation, 1);
        assert!(c.get(k).unwrap().result.articles.is_empty());

        let e2 = c.put(k, ScrapeResult::default());
        assert_eq!(e2.generation, 2);
        assert!(!Arc::ptr_eq(&e1.result, &c.get(k).unwrap().result));
    }

    #[test]
    fn keys_are_independent() {
        let c = CacheStore::new();
        c.put(CacheKey::All, ScrapeResult::default());
        assert!(c.has(CacheKey::All));
        assert!(!c.has(CacheKey::Category(Category::Sports)));
        let snap = c.snapshot();
        assert_eq!(snap.len(), 6);
        assert_eq!(
            snap.iter().filter(|s| s.state == EntryState::Populated).count(),
            1
        );
    }

    #[test]
    fn refreshing_keeps_previous_value_readable() {
        let c = CacheStore::new();
        let k = CacheKey::All;
        c.put(k, ScrapeResult::default());
        c.mark_refreshing(k);
        assert!(c.get(k).is_some());
        c.clear_refreshing(k);
        assert_eq!(c.state(k), EntryState::Populated);
    }
}
