// tests/common/mod.rs
//
// Shared helpers: an in-memory SourceAdapter with scripted behaviour and a
// call counter, plus constructors for registries/state without any network.
#![allow(dead_code)]

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use news_aggregator::ingest::types::{RawItem, SourceAdapter};
use news_aggregator::{AppConfig, Category, SourceError, SourceRegistry};

pub const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

#[derive(Clone)]
pub enum Behavior {
    /// Return these items on every call.
    Items(Vec<RawItem>),
    /// One item per call whose title and link carry the call number.
    Numbered,
    Fail,
    Panic,
    /// Never finish on its own.
    Hang,
}

pub struct MockAdapter {
    name: String,
    behavior: Behavior,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl MockAdapter {
    pub fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            behavior,
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = d;
        self
    }

    /// Counter that keeps working after the adapter moves into a registry.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn fetch(&self, _category: Category) -> Result<Vec<RawItem>, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            Behavior::Items(v) => Ok(v.clone()),
            Behavior::Numbered => Ok(vec![item(
                &format!("{} call {n}", self.name),
                &format!("https://{}.example/story-{n}", self.name),
                "Mon, 03 Mar 2025 10:00:00 GMT",
            )]),
            Behavior::Fail => Err(SourceError::Status(503)),
            Behavior::Panic => panic!("{} adapter blew up", self.name),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn item(title: &str, link: &str, published: &str) -> RawItem {
    RawItem {
        title: Some(title.to_string()),
        link: Some(link.to_string()),
        content: Some(format!("<p>{title} body</p>")),
        published: Some(published.to_string()),
        ..RawItem::default()
    }
}

pub fn calls(c: &Arc<AtomicUsize>) -> usize {
    c.load(Ordering::SeqCst)
}

/// Register `adapter` under its own name and return its call counter.
pub fn add(reg: &mut SourceRegistry, category: Category, adapter: MockAdapter) -> Arc<AtomicUsize> {
    let counter = adapter.calls();
    let id = adapter.name.clone();
    reg.register(id, category, Arc::new(adapter));
    counter
}

pub fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

/// Short timeouts so failure paths finish quickly.
pub fn test_config() -> AppConfig {
    AppConfig {
        source_timeout: Duration::from_millis(500),
        aggregate_timeout: Duration::from_secs(2),
        ..AppConfig::default()
    }
}
