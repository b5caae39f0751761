// src/ingest/registry.rs
//! Static table of publishers and the adapters built from it.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::article::{CacheKey, Category};
use crate::config::AppConfig;
use crate::ingest::providers::html::{HtmlListingAdapter, HtmlSelectors};
use crate::ingest::providers::rss::RssAdapter;
use crate::ingest::types::SourceAdapter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Rss,
    Html,
}

fn default_enabled() -> bool {
    true
}

/// One publisher entry as written in `config/sources.toml` / `.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceSpec {
    /// Unique key used in `sourceErrors`.
    pub id: String,
    /// Publisher display name.
    pub name: String,
    pub category: Category,
    pub url: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// Required for `kind = "html"`.
    #[serde(default)]
    pub selectors: Option<HtmlSelectors>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl SourceSpec {
    pub fn rss(id: &str, name: &str, category: Category, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            url: url.to_string(),
            kind: SourceKind::Rss,
            selectors: None,
            enabled: true,
        }
    }
}

const DEFAULT_RSS: &[(&str, &str, Category, &str)] = &[
    ("bbc-world", "BBC News", Category::International, "https://feeds.bbci.co.uk/news/world/rss.xml"),
    ("aljazeera", "Al Jazeera", Category::International, "https://www.aljazeera.com/xml/rss/all.xml"),
    ("espn", "ESPN", Category::Sports, "https://www.espn.com/espn/rss/news"),
    ("bbc-sport", "BBC Sport", Category::Sports, "https://feeds.bbci.co.uk/sport/rss.xml"),
    ("ars-technica", "Ars Technica", Category::Technology, "https://feeds.arstechnica.com/arstechnica/index"),
    ("bbc-technology", "BBC News", Category::Technology, "https://feeds.bbci.co.uk/news/technology/rss.xml"),
    ("techcrunch", "TechCrunch", Category::Technology, "https://techcrunch.com/feed/"),
    ("bbc-health", "BBC News", Category::Health, "https://feeds.bbci.co.uk/news/health/rss.xml"),
    ("npr-health", "NPR", Category::Health, "https://feeds.npr.org/1128/rss.xml"),
    ("sciencedaily", "ScienceDaily", Category::Science, "https://www.sciencedaily.com/rss/top/science.xml"),
    ("bbc-science", "BBC News", Category::Science, "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml"),
];

/// Built-in publisher table used when no registry file is configured.
pub fn default_sources() -> Vec<SourceSpec> {
    let mut out: Vec<SourceSpec> = DEFAULT_RSS
        .iter()
        .map(|(id, name, cat, url)| SourceSpec::rss(id, name, *cat, url))
        .collect();
    out.push(SourceSpec {
        id: "cnn-lite".to_string(),
        name: "CNN".to_string(),
        category: Category::International,
        url: "https://lite.cnn.com".to_string(),
        kind: SourceKind::Html,
        selectors: Some(HtmlSelectors::new(".card--lite")),
        enabled: true,
    });
    out
}

/// A source bound to the category it feeds.
#[derive(Clone)]
pub struct RegisteredSource {
    pub id: String,
    pub category: Category,
    pub adapter: Arc<dyn SourceAdapter>,
}

#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<RegisteredSource>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source. A repeated `id` replaces the earlier entry.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        category: Category,
        adapter: Arc<dyn SourceAdapter>,
    ) -> &mut Self {
        let id = id.into();
        if let Some(pos) = self.sources.iter().position(|s| s.id == id) {
            tracing::warn!(target: "ingest", %id, "source registered twice; replacing");
            self.sources.remove(pos);
        }
        self.sources.push(RegisteredSource {
            id,
            category,
            adapter,
        });
        self
    }

    pub fn with_source(
        mut self,
        id: impl Into<String>,
        category: Category,
        adapter: Arc<dyn SourceAdapter>,
    ) -> Self {
        self.register(id, category, adapter);
        self
    }

    /// Sources feeding `key`; every source for [`CacheKey::All`].
    pub fn for_key(&self, key: CacheKey) -> Vec<RegisteredSource> {
        self.sources
            .iter()
            .filter(|s| key.category().map_or(true, |c| c == s.category))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(|s| s.id.as_str())
    }

    /// Build HTTP-backed adapters for every enabled spec.
    pub fn from_specs(specs: &[SourceSpec], cfg: &AppConfig, client: &reqwest::Client) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut reg = Self::new();
        for spec in specs.iter().filter(|s| s.enabled) {
            if !seen.insert(spec.id.as_str()) {
                bail!("duplicate source id '{}'", spec.id);
            }
            let adapter: Arc<dyn SourceAdapter> = match spec.kind {
                SourceKind::Rss => Arc::new(
                    RssAdapter::from_url(&spec.name, &spec.url, client.clone(), cfg.source_timeout)
                        .with_max_items(cfg.max_items_per_source),
                ),
                SourceKind::Html => {
                    let selectors = spec
                        .selectors
                        .clone()
                        .with_context(|| format!("source '{}' is html but has no selectors", spec.id))?;
                    Arc::new(
                        HtmlListingAdapter::from_url(
                            &spec.name,
                            &spec.url,
                            selectors,
                            client.clone(),
                            cfg.source_timeout,
                        )
                        .with_context(|| format!("building html source '{}'", spec.id))?
                        .with_max_items(cfg.max_items_per_source),
                    )
                }
            };
            reg.register(spec.id.clone(), spec.category, adapter);
        }
        Ok(reg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_every_category() {
        let specs = default_sources();
        for c in Category::ALL {
            assert!(specs.iter().any(|s| s.category == c), "no source for {c}");
        }
        let ids: HashSet<_> = specs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), specs.len(), "ids must be unique");
    }

    #[test]
    fn from_specs_filters_by_key_and_rejects_duplicates() {
        let cfg = AppConfig::default();
        let client = reqwest::Client::new();
        let reg = SourceRegistry::from_specs(&default_sources(), &cfg, &client).unwrap();
        assert_eq!(reg.len(), default_sources().len());
        assert_eq!(reg.for_key(CacheKey::All).len(), reg.len());
        assert!(reg
            .for_key(CacheKey::Category(Category::Sports))
            .iter()
            .all(|s| s.category == Category::Sports));

        let mut dup = default_sources();
        dup.push(dup[0].clone());
        assert!(SourceRegistry::from_specs(&dup, &cfg, &client).is_err());
    }

    #[test]
    fn html_without_selectors_is_an_error() {
        let mut spec = SourceSpec::rss("x", "X", Category::Health, "https://example.com");
        spec.kind = SourceKind::Html;
        let err = SourceRegistry::from_specs(&[spec], &AppConfig::default(), &reqwest::Client::new());
        assert!(err.is_err());
    }
}
