use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use newsmirror_core::model::article::{Article, UpstreamArticle};
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Meter};
use serde_json::json;
use tracing::Instrument;
use tracing::field::Empty;

pub const DEFAULT_TAG: &str = "technology";
pub const DEFAULT_PER_PAGE: i64 = 5;
pub const MAX_PER_PAGE: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Upstream error from DEV.to API")]
    UpstreamStatus(StatusCode),
    #[error("Unable to reach DEV.to API")]
    UpstreamUnreachable(#[source] reqwest::Error),
    #[error("Invalid response from DEV.to API")]
    UpstreamPayload(#[source] reqwest::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::UpstreamStatus(status) => *status,
            Self::UpstreamUnreachable(_) | Self::UpstreamPayload(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Rejects a page size outside 1..=30 before anything else happens.
pub fn validate_per_page(per_page: i64) -> Result<usize, ApiError> {
    if (1..=MAX_PER_PAGE).contains(&per_page) {
        Ok(per_page as usize)
    } else {
        Err(ApiError::Validation(format!(
            "per_page must be between 1 and {MAX_PER_PAGE}, got {per_page}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct DevtoClient {
    http: reqwest::Client,
    url: String,
}

impl DevtoClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("newsmirror/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    /// One upstream call, projected and truncated to `per_page`.
    pub async fn fetch_articles(
        &self,
        tag: &str,
        per_page: usize,
    ) -> Result<Vec<Article>, ApiError> {
        let span = tracing::info_span!(
            "devto.fetch_articles",
            otel.kind = "client",
            http.method = "GET",
            http.url = %self.url,
            devto.tag = tag,
            devto.per_page = per_page,
            http.status_code = Empty,
            otel.status_code = Empty,
        );
        let result = self
            .fetch(tag, per_page, &span)
            .instrument(span.clone())
            .await;
        if result.is_err() {
            span.record("otel.status_code", "ERROR");
        }
        result
    }

    async fn fetch(
        &self,
        tag: &str,
        per_page: usize,
        span: &tracing::Span,
    ) -> Result<Vec<Article>, ApiError> {
        let per_page_param = per_page.to_string();
        let resp = self
            .http
            .get(&self.url)
            .query(&[("tag", tag), ("per_page", per_page_param.as_str())])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "DEV.to request failed");
                ApiError::UpstreamUnreachable(e)
            })?;

        let status = resp.status();
        span.record("http.status_code", status.as_u16());
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "DEV.to returned an error status");
            return Err(ApiError::UpstreamStatus(status));
        }

        let upstream: Vec<UpstreamArticle> = resp.json().await.map_err(|e| {
            tracing::warn!(error = %e, "DEV.to response could not be read");
            if e.is_timeout() {
                ApiError::UpstreamUnreachable(e)
            } else {
                ApiError::UpstreamPayload(e)
            }
        })?;

        Ok(upstream
            .into_iter()
            .take(per_page)
            .map(Article::from)
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct NewsMetrics {
    requests: Counter<u64>,
    articles_returned: Counter<u64>,
}

impl NewsMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: meter
                .u64_counter("devto.news.requests")
                .with_description("Number of calls to the /news endpoint")
                .build(),
            articles_returned: meter
                .u64_counter("devto.news.articles_returned")
                .with_description("Number of articles returned to callers")
                .build(),
        }
    }

    pub fn record_request(&self, tag: &str) {
        self.requests
            .add(1, &[KeyValue::new("tag", tag.to_string())]);
    }

    pub fn record_articles(&self, tag: &str, count: usize) {
        self.articles_returned
            .add(count as u64, &[KeyValue::new("tag", tag.to_string())]);
    }
}
