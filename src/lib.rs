// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregate;
pub mod api;
pub mod article;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

pub use crate::aggregate::{Aggregator, ScrapeResult};
pub use crate::api::{router, AppState, ArticlesBody, ArticlesEnvelope, TriggerResponse};
pub use crate::article::{Article, CacheKey, Category, TimestampSource};
pub use crate::cache::CacheStore;
pub use crate::config::AppConfig;
pub use crate::error::{AggregateError, ApiError, SourceError};
pub use crate::ingest::registry::SourceRegistry;
pub use crate::orchestrator::{CacheStatus, Orchestrator};

/// Wire an orchestrator around an already built registry. The cache starts
/// empty; nothing is fetched until the first request.
pub fn state_with_registry(cfg: AppConfig, registry: SourceRegistry) -> AppState {
    let aggregator = Aggregator::new(registry, cfg.source_timeout, cfg.aggregate_timeout);
    let orchestrator = Orchestrator::new(
        Arc::new(CacheStore::new()),
        Arc::new(aggregator),
        cfg.max_articles,
    );
    AppState::new(orchestrator, cfg)
}

/// Load the source table and build the HTTP-backed state.
pub fn build_state(cfg: AppConfig) -> anyhow::Result<AppState> {
    let specs = ingest::config::load_sources_default(cfg.sources_path.as_deref())
        .context("loading source registry")?;
    let client = cfg.http_client().context("building http client")?;
    let registry = SourceRegistry::from_specs(&specs, &cfg, &client)?;
    info!(
        target: "ingest",
        sources = registry.len(),
        ids = ?registry.ids().collect::<Vec<_>>(),
        "source registry ready"
    );
    Ok(state_with_registry(cfg, registry))
}
