// src/ingest/providers/html.rs
//! Listing-page scraper for publishers without a usable feed.
//!
//! Each item on the page is located with a CSS selector; title, link, summary,
//! image and time are then looked up inside the item. Relative links are
//! resolved against the page URL.

use async_trait::async_trait;
use metrics::{counter, histogram};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use url::Url;

use super::Mode;
use crate::article::Category;
use crate::error::SourceError;
use crate::ingest::types::{RawItem, SourceAdapter};

fn default_link() -> String {
    "a[href]".to_string()
}

fn default_image() -> String {
    "img".to_string()
}

fn default_time() -> String {
    "time".to_string()
}

/// CSS selectors describing one listing page layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HtmlSelectors {
    /// One match per story.
    pub item: String,
    /// Headline inside the item; the link text is used when absent.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default = "default_image")]
    pub image: String,
    #[serde(default = "default_time")]
    pub time: String,
}

impl HtmlSelectors {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            title: None,
            link: default_link(),
            summary: None,
            image: default_image(),
            time: default_time(),
        }
    }
}

struct Compiled {
    item: Selector,
    title: Option<Selector>,
    link: Selector,
    summary: Option<Selector>,
    image: Selector,
    time: Selector,
}

fn compile(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector '{css}': {e:?}")))
}

impl HtmlSelectors {
    fn compile(&self) -> Result<Compiled, SourceError> {
        Ok(Compiled {
            item: compile(&self.item)?,
            title: self.title.as_deref().map(compile).transpose()?,
            link: compile(&self.link)?,
            summary: self.summary.as_deref().map(compile).transpose()?,
            image: compile(&self.image)?,
            time: compile(&self.time)?,
        })
    }
}

pub struct HtmlListingAdapter {
    name: String,
    mode: Mode,
    base_url: Option<Url>,
    selectors: HtmlSelectors,
    max_items: usize,
}

impl HtmlListingAdapter {
    /// Fails when a selector does not parse.
    pub fn from_url(
        name: impl Into<String>,
        url: &str,
        selectors: HtmlSelectors,
        client: reqwest::Client,
        timeout: std::time::Duration,
    ) -> Result<Self, SourceError> {
        selectors.compile()?;
        let base_url =
            Url::parse(url).map_err(|e| SourceError::Parse(format!("listing url '{url}': {e}")))?;
        Ok(Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
                timeout,
            },
            base_url: Some(base_url),
            selectors,
            max_items: usize::MAX,
        })
    }

    /// `base_url` resolves relative links found in the fixture.
    pub fn from_fixture_str(
        name: impl Into<String>,
        html: &str,
        base_url: Option<&str>,
        selectors: HtmlSelectors,
    ) -> Result<Self, SourceError> {
        selectors.compile()?;
        Ok(Self {
            name: name.into(),
            mode: Mode::Fixture(html.to_string()),
            base_url: base_url.and_then(|u| Url::parse(u).ok()),
            selectors,
            max_items: usize::MAX,
        })
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.mode.url()
    }

    fn resolve(&self, href: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(href.trim())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.trim().to_string()),
            None => href.trim().to_string(),
        }
    }

    pub fn parse_listing(&self, html: &str) -> Result<Vec<RawItem>, SourceError> {
        let t0 = std::time::Instant::now();
        let sel = self.selectors.compile()?;
        let document = Html::parse_document(html);

        let mut out = Vec::new();
        for el in document.select(&sel.item) {
            if out.len() >= self.max_items {
                break;
            }
            let raw = self.extract(el, &sel);
            if raw.is_usable() {
                out.push(raw);
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_items_total").increment(out.len() as u64);
        Ok(out)
    }

    fn extract(&self, el: ElementRef<'_>, sel: &Compiled) -> RawItem {
        let text_of = |e: ElementRef<'_>| {
            let t = e.text().collect::<Vec<_>>().join(" ");
            let t = t.trim();
            (!t.is_empty()).then(|| t.to_string())
        };

        // The item may itself be the anchor.
        let link_el = if el.value().name() == "a" && el.value().attr("href").is_some() {
            Some(el)
        } else {
            el.select(&sel.link).next()
        };
        let link = link_el
            .and_then(|a| a.value().attr("href"))
            .map(|h| self.resolve(h));

        let title = match &sel.title {
            Some(s) => el.select(s).next().and_then(text_of),
            None => link_el.and_then(text_of),
        };

        let content = sel
            .summary
            .as_ref()
            .and_then(|s| el.select(s).next())
            .map(|e| e.inner_html().trim().to_string())
            .filter(|s| !s.is_empty());

        let image_url = el.select(&sel.image).next().and_then(|img| {
            img.value()
                .attr("src")
                .or_else(|| img.value().attr("data-src"))
                .map(|s| self.resolve(s))
        });

        let published = el.select(&sel.time).next().and_then(|t| {
            t.value()
                .attr("datetime")
                .map(|s| s.to_string())
                .or_else(|| text_of(t))
        });

        RawItem {
            title,
            link,
            guid: None,
            content,
            image_url,
            published,
        }
    }
}

#[async_trait]
impl SourceAdapter for HtmlListingAdapter {
    async fn fetch(&self, _category: Category) -> Result<Vec<RawItem>, SourceError> {
        let body = self.mode.body().await.inspect_err(|e| {
            tracing::warn!(target: "ingest", error = %e, provider = %self.name, "provider http error");
        })?;
        // Html is !Send; parsing stays synchronous after the await.
        self.parse_listing(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
