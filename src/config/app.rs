// src/config/app.rs
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_SOURCE_TIMEOUT_MS: &str = "NEWS_SOURCE_TIMEOUT_MS";
pub const ENV_AGGREGATE_TIMEOUT_MS: &str = "NEWS_AGGREGATE_TIMEOUT_MS";
pub const ENV_MAX_ARTICLES: &str = "NEWS_MAX_ARTICLES";
pub const ENV_DEFAULT_LIMIT: &str = "NEWS_DEFAULT_LIMIT";
pub const ENV_MAX_ITEMS_PER_SOURCE: &str = "NEWS_MAX_ITEMS_PER_SOURCE";
pub const ENV_SOURCES_PATH: &str = "NEWS_SOURCES_PATH";
pub const ENV_USER_AGENT: &str = "NEWS_USER_AGENT";

const DEFAULT_SOURCE_TIMEOUT_MS: u64 = 8_000;
const DEFAULT_AGGREGATE_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_MAX_ARTICLES: usize = 50;
const DEFAULT_LIMIT: usize = 10;
const DEFAULT_MAX_ITEMS_PER_SOURCE: usize = 20;

/// Runtime knobs for the scrape pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bound on a single source fetch (HTTP + parse).
    pub source_timeout: Duration,
    /// Bound on a whole aggregation round.
    pub aggregate_timeout: Duration,
    /// How many articles an aggregation keeps per cache key.
    pub max_articles: NonZeroUsize,
    /// Response size when a request does not pass `limit`.
    pub default_limit: NonZeroUsize,
    pub max_items_per_source: usize,
    /// Explicit registry file; `None` means fallbacks + built-in table.
    pub sources_path: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_millis(DEFAULT_SOURCE_TIMEOUT_MS),
            aggregate_timeout: Duration::from_millis(DEFAULT_AGGREGATE_TIMEOUT_MS),
            max_articles: nz(DEFAULT_MAX_ARTICLES),
            default_limit: nz(DEFAULT_LIMIT),
            max_items_per_source: DEFAULT_MAX_ITEMS_PER_SOURCE,
            sources_path: None,
            user_agent: format!("news-aggregator/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl AppConfig {
    /// Read from process env. Bad values fall back to defaults with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        let source_timeout = parse_env::<u64>(&get, ENV_SOURCE_TIMEOUT_MS)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(d.source_timeout);
        let aggregate_timeout = parse_env::<u64>(&get, ENV_AGGREGATE_TIMEOUT_MS)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(d.aggregate_timeout);
        let max_articles = parse_env::<NonZeroUsize>(&get, ENV_MAX_ARTICLES).unwrap_or(d.max_articles);
        // default_limit never exceeds what the cache holds
        let default_limit = parse_env::<NonZeroUsize>(&get, ENV_DEFAULT_LIMIT)
            .unwrap_or(d.default_limit)
            .min(max_articles);
        let max_items_per_source =
            parse_env::<usize>(&get, ENV_MAX_ITEMS_PER_SOURCE).unwrap_or(d.max_items_per_source);
        let sources_path = get(ENV_SOURCES_PATH)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        let user_agent = get(ENV_USER_AGENT)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(d.user_agent);

        Self {
            source_timeout,
            aggregate_timeout,
            max_articles,
            default_limit,
            max_items_per_source,
            sources_path,
            user_agent,
        }
    }

    /// Clamp a requested response size into `1..=max_articles`.
    pub fn effective_limit(&self, requested: Option<usize>) -> NonZeroUsize {
        match requested {
            None => self.default_limit,
            Some(n) => NonZeroUsize::new(n.max(1))
                .unwrap_or(self.default_limit)
                .min(self.max_articles),
        }
    }

    /// Shared HTTP client for all publisher fetches.
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.source_timeout.min(Duration::from_secs(4)))
            .timeout(self.source_timeout)
            .build()?;
        Ok(client)
    }
}

fn parse_env<T: std::str::FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = get(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(target: "config", key, value = %raw, "ignoring unparsable value");
            None
        }
    }
}

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap_or(NonZeroUsize::MIN)
}
