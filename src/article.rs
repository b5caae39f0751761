// src/article.rs
//! Canonical article record, the closed category set, and cache keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ApiError;

/// Topical tag partitioning articles and cache keys. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    International,
    Sports,
    Technology,
    Health,
    Science,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::International,
        Category::Sports,
        Category::Technology,
        Category::Health,
        Category::Science,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::International => "International",
            Category::Sports => "Sports",
            Category::Technology => "Technology",
            Category::Health => "Health",
            Category::Science => "Science",
        }
    }

    /// Image used when a source item carries none.
    pub fn placeholder_image(&self) -> &'static str {
        match self {
            Category::International => "/static/placeholders/international.svg",
            Category::Sports => "/static/placeholders/sports.svg",
            Category::Technology => "/static/placeholders/technology.svg",
            Category::Health => "/static/placeholders/health.svg",
            Category::Science => "/static/placeholders/science.svg",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ApiError;

    /// Canonical names, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(t))
            .ok_or_else(|| ApiError::InvalidCategory(t.to_string()))
    }
}

/// Cache key: one per category plus the "all" bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    Category(Category),
    All,
}

impl CacheKey {
    pub fn all_keys() -> impl Iterator<Item = CacheKey> {
        Category::ALL
            .into_iter()
            .map(CacheKey::Category)
            .chain(std::iter::once(CacheKey::All))
    }

    pub fn category(&self) -> Option<Category> {
        match self {
            CacheKey::Category(c) => Some(*c),
            CacheKey::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKey::Category(c) => c.as_str(),
            CacheKey::All => "all",
        }
    }
}

impl From<Option<Category>> for CacheKey {
    fn from(c: Option<Category>) -> Self {
        c.map(CacheKey::Category).unwrap_or(CacheKey::All)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CacheKey {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Where an article's `timestamp` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Parsed from the publisher's own date field.
    Published,
    /// Publisher date missing or unparsable; time of normalization.
    Fetched,
}

/// One normalized news item. Immutable once built by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub source: String,
    pub category: Category,
    pub content: String,
    pub preview: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub timestamp_source: TimestampSource,
}
