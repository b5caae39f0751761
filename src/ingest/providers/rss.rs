// src/ingest/providers/rss.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use super::Mode;
use crate::article::Category;
use crate::error::SourceError;
use crate::ingest::types::{RawItem, SourceAdapter};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Text>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
    description: Option<String>,
    #[serde(rename = "content:encoded", alias = "encoded")]
    encoded: Option<String>,
    #[serde(default)]
    enclosure: Vec<MediaRef>,
    #[serde(rename = "media:content", alias = "content", default)]
    media_content: Vec<MediaRef>,
    #[serde(rename = "media:thumbnail", alias = "thumbnail", default)]
    media_thumbnail: Vec<MediaRef>,
}

#[derive(Debug, Deserialize)]
struct Text {
    #[serde(rename = "$text")]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MediaRef {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@type")]
    kind: Option<String>,
}

impl MediaRef {
    fn image_url(&self) -> Option<String> {
        let is_image = self
            .kind
            .as_deref()
            .map(|k| k.starts_with("image/"))
            .unwrap_or(true);
        self.url.clone().filter(|u| is_image && !u.trim().is_empty())
    }
}

/// First `<img src="...">` inside an HTML fragment.
pub(crate) fn first_img_src(html: &str) -> Option<String> {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG.get_or_init(|| {
        Regex::new(r#"(?is)<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#).expect("img regex")
    });
    re.captures(html).map(|c| c[1].to_string())
}

/// RSS 2.0 feed adapter.
pub struct RssAdapter {
    name: String,
    mode: Mode,
    max_items: usize,
}

impl RssAdapter {
    /// Parse a document held in memory instead of fetching.
    pub fn from_fixture_str(name: impl Into<String>, xml: &str) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Fixture(xml.to_string()),
            max_items: usize::MAX,
        }
    }

    pub fn from_url(
        name: impl Into<String>,
        url: impl Into<String>,
        client: reqwest::Client,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client,
                timeout,
            },
            max_items: usize::MAX,
        }
    }

    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = max;
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.mode.url()
    }

    pub fn parse_items_from_str(&self, s: &str) -> Result<Vec<RawItem>, SourceError> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean)
            .map_err(|e| SourceError::Parse(format!("{} rss xml: {e}", self.name)))?;

        let mut out = Vec::with_capacity(rss.channel.item.len().min(self.max_items));
        for it in rss.channel.item {
            if out.len() >= self.max_items {
                break;
            }
            let image_url = it
                .enclosure
                .iter()
                .chain(&it.media_content)
                .chain(&it.media_thumbnail)
                .find_map(MediaRef::image_url)
                .or_else(|| it.description.as_deref().and_then(first_img_src))
                .or_else(|| it.encoded.as_deref().and_then(first_img_src));

            let raw = RawItem {
                title: it.title,
                link: it.link,
                guid: it.guid.and_then(|g| g.value),
                // full body when the feed ships one, summary otherwise
                content: it.encoded.or(it.description),
                image_url,
                published: it.pub_date.or(it.dc_date),
            };
            if !raw.is_usable() {
                continue;
            }
            out.push(raw);
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_items_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    async fn fetch(&self, _category: Category) -> Result<Vec<RawItem>, SourceError> {
        let body = self.mode.body().await.inspect_err(|e| {
            tracing::warn!(target: "ingest", error = %e, provider = %self.name, "provider http error");
        })?;
        self.parse_items_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// HTML-only named entities are not valid XML; feeds ship them anyway.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
