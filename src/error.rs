// src/error.rs
//! Error taxonomy. Per-source errors are absorbed into `source_errors`;
//! only `ApiError` ever reaches the HTTP boundary.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;

/// Failure of a single source during one aggregation round.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("adapter panicked")]
    Panicked,
    #[error("aggregation deadline exceeded")]
    DeadlineExceeded,
}

impl SourceError {
    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Http(_) => "http",
            SourceError::Status(_) => "status",
            SourceError::Timeout(_) => "timeout",
            SourceError::Parse(_) => "parse",
            SourceError::Panicked => "panicked",
            SourceError::DeadlineExceeded => "deadline",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("no sources registered for '{0}'")]
    NoSources(String),
    #[error("aggregation task failed: {0}")]
    Task(String),
}

/// Errors surfaced to HTTP callers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid category '{0}'")]
    InvalidCategory(String),
    #[error("invalid query: {0}")]
    BadQuery(String),
    #[error("article '{0}' not found")]
    NotFound(String),
    #[error("aggregation failed: {0}")]
    AggregationFatal(#[from] AggregateError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidCategory(_) => "invalid_category",
            ApiError::BadQuery(_) => "invalid_query",
            ApiError::NotFound(_) => "not_found",
            ApiError::AggregationFatal(_) => "aggregation_fatal",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCategory(_) | ApiError::BadQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AggregationFatal(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(target: "api", error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
