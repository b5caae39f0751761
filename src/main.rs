//! News aggregator binary entrypoint.
//! Boots the Axum HTTP server with the scrape orchestrator, shared cache, and
//! the Prometheus `/metrics` route.

use news_aggregator::{api, build_state, metrics::Metrics, AppConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_aggregator=info,warn"));

    // the hosting runtime may already have installed a subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    tracing::info!(
        source_timeout_ms = cfg.source_timeout.as_millis() as u64,
        aggregate_timeout_ms = cfg.aggregate_timeout.as_millis() as u64,
        max_articles = cfg.max_articles.get(),
        "starting news aggregator"
    );

    let state = build_state(cfg)?;
    let metrics = Metrics::init(state.orchestrator.aggregator().registry().len())?;

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
