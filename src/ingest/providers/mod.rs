// src/ingest/providers/mod.rs
pub mod html;
pub mod rss;

use crate::error::SourceError;

/// GET `url` and return the body, mapping transport failures into [`SourceError`].
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    timeout: std::time::Duration,
) -> Result<String, SourceError> {
    let resp = client.get(url).send().await.map_err(|e| classify(e, timeout))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status(status.as_u16()));
    }
    resp.text().await.map_err(|e| classify(e, timeout))
}

fn classify(e: reqwest::Error, timeout: std::time::Duration) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout(timeout)
    } else {
        SourceError::Http(e)
    }
}

/// Where an adapter gets its document from.
#[derive(Clone)]
pub(crate) enum Mode {
    /// Owned copy of a document; used by tests and offline runs.
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
        timeout: std::time::Duration,
    },
}

impl Mode {
    pub(crate) async fn body(&self) -> Result<String, SourceError> {
        match self {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http {
                url,
                client,
                timeout,
            } => get_text(client, url, *timeout).await,
        }
    }

    pub(crate) fn url(&self) -> Option<&str> {
        match self {
            Mode::Fixture(_) => None,
            Mode::Http { url, .. } => Some(url),
        }
    }
}
