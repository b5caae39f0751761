// src/api.rs
//! HTTP surface. Every listing is served through the orchestrator, so a request
//! either reads the cache or joins the single aggregation running for its key.
//! Only `POST /api/trigger-scrape` forces a refresh.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header::HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::article::{Article, CacheKey, Category};
use crate::cache::KeyStatus;
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};
use crate::orchestrator::{CacheStatus, Orchestrator, Served};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: AppConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/articles", get(list_articles))
        .route("/api/articles/{id}", get(get_article))
        .route("/api/scrape/{category}", get(scrape_category))
        .route("/api/scrape-all", get(scrape_all))
        .route("/api/trigger-scrape", post(trigger_scrape))
        .route("/api/cache/status", get(cache_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Tagged listing envelope returned by the scrape endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticlesEnvelope {
    pub kind: EnvelopeKind,
    pub category: String,
    pub count: usize,
    pub articles: Vec<Article>,
    pub cached: bool,
    pub refreshed_at: DateTime<Utc>,
    #[serde(default)]
    pub source_errors: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    Articles,
}

/// Either listing shape a client may receive: the legacy bare array or the
/// tagged envelope. The JSON top level (array vs. object) decides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ArticlesBody {
    Bare(Vec<Article>),
    Envelope(ArticlesEnvelope),
}

impl ArticlesBody {
    pub fn into_articles(self) -> Vec<Article> {
        match self {
            ArticlesBody::Bare(v) => v,
            ArticlesBody::Envelope(e) => e.articles,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub success: bool,
    pub count: usize,
    pub articles: Vec<Article>,
    pub source_errors: BTreeMap<String, String>,
}

// `limit` stays a string so a bad category is reported before a bad limit.
#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    #[serde(default)]
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TriggerQuery {
    #[serde(default)]
    category: Option<String>,
}

/// `None` and `""` both mean every category.
fn parse_key(raw: Option<&str>) -> ApiResult<CacheKey> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(CacheKey::All),
        Some(s) => Ok(CacheKey::Category(s.parse::<Category>()?)),
    }
}

/// Malformed query strings get the JSON error body like every other failure.
fn query<T>(q: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    q.map(|Query(v)| v)
        .map_err(|e| ApiError::BadQuery(e.body_text()))
}

/// `None` and `""` mean "not given".
fn parse_limit(raw: Option<&str>) -> ApiResult<Option<usize>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ApiError::BadQuery(format!("limit '{s}' is not a non-negative integer"))),
    }
}

fn with_cache_header<T: IntoResponse>(status: CacheStatus, body: T) -> Response {
    (
        [(X_CACHE, HeaderValue::from_static(status.as_header()))],
        body,
    )
        .into_response()
}

fn head(served: &Served, limit: usize) -> Vec<Article> {
    served.result.articles.iter().take(limit).cloned().collect()
}

async fn list_articles(
    State(st): State<AppState>,
    q: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let q = query(q)?;
    // validated before anything touches the orchestrator
    let key = parse_key(q.category.as_deref())?;
    let limit = st.config.effective_limit(parse_limit(q.limit.as_deref())?);
    let served = st.orchestrator.read_or_populate(key).await?;
    Ok(with_cache_header(served.cache, Json(head(&served, limit.get()))))
}

async fn get_article(State(st): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Article>> {
    st.orchestrator
        .find_article(&id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound(id))
}

async fn scrape_category(
    State(st): State<AppState>,
    Path(category): Path<String>,
    q: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let q = query(q)?;
    let key = CacheKey::Category(category.parse::<Category>()?);
    envelope_for(&st, key, parse_limit(q.limit.as_deref())?).await
}

async fn scrape_all(
    State(st): State<AppState>,
    q: Result<Query<LimitQuery>, QueryRejection>,
) -> ApiResult<Response> {
    let limit = parse_limit(query(q)?.limit.as_deref())?;
    envelope_for(&st, CacheKey::All, limit).await
}

async fn envelope_for(st: &AppState, key: CacheKey, limit: Option<usize>) -> ApiResult<Response> {
    // without `limit` the whole cached entry is returned
    let limit = match limit {
        Some(n) => st.config.effective_limit(Some(n)).get(),
        None => usize::MAX,
    };
    let served = st.orchestrator.read_or_populate(key).await?;
    let articles = head(&served, limit);
    let body = ArticlesEnvelope {
        kind: EnvelopeKind::Articles,
        category: key.to_string(),
        count: articles.len(),
        articles,
        cached: served.cache != CacheStatus::Miss,
        refreshed_at: served.refreshed_at,
        source_errors: served.result.source_errors.clone(),
    };
    Ok(with_cache_header(served.cache, Json(body)))
}

async fn trigger_scrape(
    State(st): State<AppState>,
    q: Result<Query<TriggerQuery>, QueryRejection>,
) -> ApiResult<Json<TriggerResponse>> {
    let key = parse_key(query(q)?.category.as_deref())?;
    let served = match key {
        CacheKey::All => st.orchestrator.refresh_everything().await?,
        k => st.orchestrator.force_refresh(k).await?,
    };
    let res = &served.result;
    info!(
        target: "api",
        %key,
        count = res.articles.len(),
        failed = res.source_errors.len(),
        cache = served.cache.as_header(),
        "trigger-scrape"
    );
    Ok(Json(TriggerResponse {
        success: !res.all_failed(),
        count: res.articles.len(),
        articles: res.articles.clone(),
        source_errors: res.source_errors.clone(),
    }))
}

async fn cache_status(State(st): State<AppState>) -> Json<Vec<KeyStatus>> {
    Json(st.orchestrator.cache().snapshot())
}
