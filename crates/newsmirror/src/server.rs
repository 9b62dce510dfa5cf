use std::time::Duration;

use anyhow::Context;
use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{Request, Response};
use axum::routing::get;
use newsmirror_core::config::Config;
use newsmirror_core::model::article::NewsResponse;
use opentelemetry::metrics::Meter;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::Span;
use tracing::field::Empty;

use crate::news::{
    ApiError, DEFAULT_PER_PAGE, DEFAULT_TAG, DevtoClient, NewsMetrics, validate_per_page,
};

#[derive(Debug, Clone)]
pub struct AppState {
    devto: DevtoClient,
    metrics: NewsMetrics,
}

impl AppState {
    pub fn new(cfg: &Config, meter: &Meter) -> anyhow::Result<Self> {
        let devto = DevtoClient::new(cfg.devto_api_url.clone(), cfg.upstream_timeout)
            .context("build DEV.to http client")?;
        Ok(Self {
            devto,
            metrics: NewsMetrics::new(meter),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NewsParams {
    tag: Option<String>,
    per_page: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/news", get(news))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http.request",
                        otel.kind = "server",
                        otel.name = %format!("{} {}", req.method(), req.uri().path()),
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                    )
                })
                .on_response(|res: &Response<Body>, latency: Duration, span: &Span| {
                    span.record("http.status_code", res.status().as_u16());
                    tracing::debug!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        "request finished"
                    );
                }),
        )
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn news(
    State(state): State<AppState>,
    params: Result<Query<NewsParams>, QueryRejection>,
) -> Result<Json<NewsResponse>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let tag = params.tag.unwrap_or_else(|| DEFAULT_TAG.to_string());
    let per_page = match params.per_page.as_deref() {
        None => DEFAULT_PER_PAGE,
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            ApiError::Validation(format!("per_page must be an integer, got {raw:?}"))
        })?,
    };
    let per_page = validate_per_page(per_page)?;

    state.metrics.record_request(&tag);
    tracing::info!(tag = %tag, per_page, "fetching news");

    let articles = state.devto.fetch_articles(&tag, per_page).await?;
    state.metrics.record_articles(&tag, articles.len());
    tracing::info!(tag = %tag, count = articles.len(), "news served");

    Ok(Json(NewsResponse::new(tag, articles)))
}
