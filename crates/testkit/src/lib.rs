use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use bson::Document;
use futures::FutureExt;
use futures::future::BoxFuture;
use newsmirror_core::error::{MirrorError, Result};
use newsmirror_store::{DocumentSink, SharedSink};
use serde_json::{Value, json};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

#[derive(Debug, Default)]
struct SinkState {
    docs: Vec<Document>,
    insert_calls: usize,
    failing: bool,
    delay: Option<Duration>,
}

/// In-memory `DocumentSink` that records every write and can be switched to fail.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    /// Every insert sleeps for `delay` before it is recorded.
    pub fn with_delay(delay: Duration) -> Self {
        let sink = Self::default();
        sink.state.lock().unwrap().delay = Some(delay);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn documents(&self) -> Vec<Document> {
        self.state.lock().unwrap().docs.clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    pub fn shared(&self) -> SharedSink {
        Arc::new(self.clone())
    }

    fn delay(&self) -> Option<Duration> {
        self.state.lock().unwrap().delay
    }

    fn record(&self, docs: Vec<Document>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.insert_calls += 1;
        if state.failing {
            return Err(MirrorError::Store("memory sink configured to fail".into()));
        }
        state.docs.extend(docs);
        Ok(())
    }
}

impl DocumentSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn insert_one(&self, doc: Document) -> BoxFuture<'static, Result<()>> {
        self.insert_many(vec![doc])
    }

    fn insert_many(&self, docs: Vec<Document>) -> BoxFuture<'static, Result<()>> {
        let sink = self.clone();
        async move {
            if let Some(delay) = sink.delay() {
                tokio::time::sleep(delay).await;
            }
            sink.record(docs)
        }
        .boxed()
    }
}

/// Layer that remembers the level and target of every event it sees.
#[derive(Debug, Clone, Default)]
pub struct EventCounter {
    events: Arc<Mutex<Vec<(Level, String)>>>,
}

impl EventCounter {
    pub fn count_on(&self, level: Level, target: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, t)| *l == level && t == target)
            .count()
    }
}

impl<S: Subscriber> Layer<S> for EventCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        self.events
            .lock()
            .unwrap()
            .push((*meta.level(), meta.target().to_string()));
    }
}

pub fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// URL on a port nothing listens on, for connection-refused paths.
pub fn unreachable_url() -> String {
    format!("http://127.0.0.1:{}/api/articles", free_port())
}

pub fn sample_articles(count: usize) -> Value {
    let articles = (0..count)
        .map(|i| {
            json!({
                "type_of": "article",
                "id": 1000 + i,
                "title": format!("Article {i}"),
                "description": format!("Summary of article {i}"),
                "url": format!("https://dev.to/author{i}/article-{i}"),
                "published_at": "2026-02-01T00:00:00Z",
                "tag_list": ["technology", "rust"],
                "tags": "technology, rust",
                "reading_time_minutes": 3,
                "user": {
                    "name": format!("Author {i}"),
                    "username": format!("author{i}"),
                    "github_username": null
                }
            })
        })
        .collect::<Vec<_>>();
    Value::Array(articles)
}

#[derive(Debug, Clone, Copy)]
pub enum UpstreamBehavior {
    /// Always answer with exactly this many articles, regardless of `per_page`.
    Articles(usize),
    Status(u16),
    Malformed,
}

#[derive(Clone)]
struct FakeState {
    behavior: UpstreamBehavior,
    hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<HashMap<String, String>>>>,
}

pub struct FakeDevto {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<HashMap<String, String>>>>,
}

impl FakeDevto {
    pub fn url(&self) -> String {
        format!("http://{}/api/articles", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<HashMap<String, String>> {
        self.last_query.lock().unwrap().clone()
    }
}

pub async fn spawn_fake_devto(behavior: UpstreamBehavior) -> anyhow::Result<FakeDevto> {
    let hits = Arc::new(AtomicUsize::new(0));
    let last_query = Arc::new(Mutex::new(None));
    let state = FakeState {
        behavior,
        hits: hits.clone(),
        last_query: last_query.clone(),
    };
    let app = Router::new()
        .route("/api/articles", get(articles))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(FakeDevto {
        addr,
        hits,
        last_query,
    })
}

async fn articles(
    State(state): State<FakeState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap() = Some(query);

    match state.behavior {
        UpstreamBehavior::Articles(count) => Json(sample_articles(count)).into_response(),
        UpstreamBehavior::Status(code) => (
            StatusCode::from_u16(code).unwrap(),
            Json(json!({"error": "upstream failure", "status": code})),
        )
            .into_response(),
        UpstreamBehavior::Malformed => (StatusCode::OK, "not json").into_response(),
    }
}
