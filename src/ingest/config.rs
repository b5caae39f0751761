// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::registry::{default_sources, SourceKind, SourceSpec};

/// Load the source table from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
        .with_context(|| format!("parsing sources from {}", path.display()))
}

/// Resolve the source table:
/// 1) `explicit` (from `NEWS_SOURCES_PATH`), which must exist
/// 2) config/sources.toml
/// 3) config/sources.json
/// 4) built-in table
pub fn load_sources_default(explicit: Option<&Path>) -> Result<Vec<SourceSpec>> {
    if let Some(p) = explicit {
        if p.exists() {
            return load_sources_from(p);
        }
        return Err(anyhow!(
            "NEWS_SOURCES_PATH points to non-existent path {}",
            p.display()
        ));
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(default_sources())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceSpec>> {
    let specs = match hint_ext {
        "toml" => parse_toml(s)?,
        "json" => parse_json(s)?,
        _ => parse_json(s).or_else(|_| parse_toml(s))?,
    };
    validate(specs)
}

fn parse_toml(s: &str) -> Result<Vec<SourceSpec>> {
    #[derive(serde::Deserialize)]
    struct TomlSources {
        #[serde(rename = "source", default)]
        sources: Vec<SourceSpec>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceSpec>> {
    let v: Vec<SourceSpec> = serde_json::from_str(s)?;
    Ok(v)
}

fn validate(items: Vec<SourceSpec>) -> Result<Vec<SourceSpec>> {
    use std::collections::BTreeSet;
    let mut ids = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for mut it in items {
        it.id = it.id.trim().to_string();
        it.url = it.url.trim().to_string();
        if it.id.is_empty() || it.url.is_empty() {
            return Err(anyhow!("source entries need a non-empty id and url"));
        }
        if !ids.insert(it.id.clone()) {
            return Err(anyhow!("duplicate source id '{}'", it.id));
        }
        if it.kind == SourceKind::Html && it.selectors.is_none() {
            return Err(anyhow!("html source '{}' needs [source.selectors]", it.id));
        }
        out.push(it);
    }
    Ok(out)
}
