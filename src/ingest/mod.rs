// src/ingest/mod.rs
//! Normalization of raw adapter output into canonical [`Article`]s.

pub mod config;
pub mod providers;
pub mod registry;
pub mod types;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::article::{Article, Category, TimestampSource};
use crate::ingest::types::RawItem;

pub const PREVIEW_CHARS: usize = 150;
const TITLE_FALLBACK_CHARS: usize = 80;
const UNTITLED: &str = "Untitled";

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Raw items parsed from sources.");
        describe_counter!("source_errors_total", "Source fetch/parse failures.");
        describe_counter!("scrape_rounds_total", "Aggregation rounds executed.");
        describe_counter!("cache_hits_total", "Reads served from cache.");
        describe_counter!("cache_misses_total", "Reads that triggered an aggregation.");
        describe_counter!(
            "cache_joined_total",
            "Callers that waited on an in-flight aggregation."
        );
        describe_histogram!("ingest_parse_ms", "Source parse time in milliseconds.");
        describe_histogram!("aggregate_ms", "Aggregation round time in milliseconds.");
        describe_gauge!("cache_last_refresh_ts", "Unix ts of the last cache write.");
        describe_gauge!("registered_sources", "Enabled sources at startup.");
    });
}

/// Strip markup for preview use: drop script/style bodies and tags, decode
/// entities, fold smart quotes, collapse whitespace. Idempotent.
pub fn sanitize_markup(s: &str) -> String {
    // Entity decoding can surface new tags ("&lt;b&gt;"), so run to a fixed point.
    // Terminates: a pass that changes the string always makes it shorter.
    let mut cur = sanitize_once(s);
    loop {
        let next = sanitize_once(&cur);
        if next == cur {
            return cur;
        }
        cur = next;
    }
}

fn sanitize_once(s: &str) -> String {
    static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_blocks = RE_BLOCKS.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("blocks regex")
    });
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z!][^>]*>").expect("tags regex"));
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("ws regex"));

    // 1) Tags first, entities after
    let out = re_blocks.replace_all(s, " ");
    let out = re_tags.replace_all(&out, " ");

    // 2) HTML entity decode
    let out = html_escape::decode_html_entities(&out).to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. nbsp)
    let out = out.replace('\u{00A0}', " ");
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Sanitized content cut to [`PREVIEW_CHARS`] with a trailing `...` when cut.
pub fn preview_text(content: &str) -> String {
    let clean = sanitize_markup(content);
    truncate_chars(&clean, PREVIEW_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

/// Lowercase scheme/host, drop fragment and trailing slash. Unparsable links are
/// only trimmed.
pub fn canonical_url(link: &str) -> String {
    let t = link.trim();
    match url::Url::parse(t) {
        Ok(mut u) => {
            u.set_fragment(None);
            let path = u.path().trim_end_matches('/').to_string();
            if path.is_empty() {
                u.set_path("");
            } else {
                u.set_path(&path);
            }
            // Url already lowercases scheme and host; a bare host still
            // serializes with a "/" path
            let out = u.to_string();
            if u.path() == "/" && u.query().is_none() {
                out.trim_end_matches('/').to_string()
            } else {
                out
            }
        }
        Err(_) => t.to_string(),
    }
}

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn non_empty(o: &Option<String>) -> Option<&str> {
    o.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Deterministic id: link if present, else publisher guid, else source + title.
pub fn stable_id(raw: &RawItem, source: &str) -> String {
    if let Some(link) = non_empty(&raw.link) {
        return hex_digest(&format!("url:{}", canonical_url(link)));
    }
    if let Some(guid) = non_empty(&raw.guid) {
        return hex_digest(&format!("guid:{}\n{}", source, guid));
    }
    let title = non_empty(&raw.title)
        .map(|t| sanitize_markup(t).to_lowercase())
        .unwrap_or_default();
    hex_digest(&format!("title:{}\n{}", source, title))
}

/// RFC 2822, RFC 3339, or naive `YYYY-MM-DD[ HH:MM:SS]` (taken as UTC).
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let t = ts.trim();
    if t.is_empty() {
        return None;
    }
    let from_unix = |odt: OffsetDateTime| DateTime::<Utc>::from_timestamp(odt.unix_timestamp(), 0);

    if let Ok(odt) = OffsetDateTime::parse(t, &Rfc2822) {
        return from_unix(odt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(t) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(odt) = OffsetDateTime::parse(t, &Rfc3339) {
        return from_unix(odt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(t, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(t, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Build the canonical article. `now` stands in for a missing or unparsable date.
pub fn normalize(raw: &RawItem, source: &str, category: Category, now: DateTime<Utc>) -> Article {
    let content = raw.content.clone().unwrap_or_default();
    let preview = preview_text(&content);

    let title = raw
        .title
        .as_deref()
        .map(sanitize_markup)
        .filter(|t| !t.is_empty())
        .or_else(|| {
            let p = sanitize_markup(&content);
            (!p.is_empty()).then(|| truncate_chars(&p, TITLE_FALLBACK_CHARS))
        })
        .unwrap_or_else(|| UNTITLED.to_string());

    let (timestamp, timestamp_source) = match raw.published.as_deref().and_then(parse_timestamp) {
        Some(ts) => (ts, TimestampSource::Published),
        None => (now, TimestampSource::Fetched),
    };

    let image_url = non_empty(&raw.image_url)
        .map(str::to_string)
        .unwrap_or_else(|| category.placeholder_image().to_string());

    let url = non_empty(&raw.link).map(canonical_url);

    Article {
        id: stable_id(raw, source),
        title,
        source: source.to_string(),
        category,
        content,
        preview,
        image_url,
        url,
        timestamp,
        timestamp_source,
    }
}
