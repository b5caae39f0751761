// src/ingest/types.rs
use crate::article::Category;
use crate::error::SourceError;

/// Candidate item as an adapter parsed it, before normalization.
/// Every field is optional; the normalizer substitutes defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    /// Body or summary; may contain markup.
    pub content: Option<String>,
    pub image_url: Option<String>,
    /// Publisher date string, unparsed.
    pub published: Option<String>,
}

impl RawItem {
    /// Items with neither a title nor a link carry nothing we can show or key on.
    pub fn is_usable(&self) -> bool {
        let has = |o: &Option<String>| o.as_deref().is_some_and(|s| !s.trim().is_empty());
        has(&self.title) || has(&self.link)
    }
}

/// One publisher's fetch + parse capability.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch the current candidates for `category`. The returned list is finite;
    /// the aggregator applies its own timeout on top of whatever the adapter does.
    async fn fetch(&self, category: Category) -> Result<Vec<RawItem>, SourceError>;

    /// Publisher display name, copied into `Article::source`.
    fn name(&self) -> &str;
}
