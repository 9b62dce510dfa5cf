use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Debug;

use chrono::Utc;
use newsmirror_core::model::log::LogDocument;
use newsmirror_core::model::to_document;
use newsmirror_store::SharedSink;
use tokio::sync::{mpsc, oneshot};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Target of the sink's own failure reports. Events on it are never persisted.
pub const SINK_DIAGNOSTIC_TARGET: &str = "newsmirror::log_sink";

/// Work for the writer task, handled in arrival order.
#[derive(Debug)]
pub enum LogCommand {
    Record(Box<LogDocument>),
    /// Answered once every record queued before it has been written or reported.
    Flush(oneshot::Sender<()>),
}

/// Persists every event reaching it as a `LogDocument`, one insert per record.
#[derive(Debug, Clone)]
pub struct LogSinkLayer {
    tx: mpsc::UnboundedSender<LogCommand>,
}

impl LogSinkLayer {
    /// Spawns the writer task on the current tokio runtime.
    pub fn new(sink: SharedSink) -> Self {
        let (layer, rx) = Self::channel();
        tokio::spawn(run_log_writer(sink, rx));
        layer
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<LogCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn handle(&self) -> LogSinkHandle {
        LogSinkHandle {
            tx: self.tx.clone(),
        }
    }
}

/// Lets the owner of the process wait for queued records before tearing the store down.
#[derive(Debug, Clone)]
pub struct LogSinkHandle {
    tx: mpsc::UnboundedSender<LogCommand>,
}

impl LogSinkHandle {
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.tx.send(LogCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }
}

pub async fn run_log_writer(sink: SharedSink, mut rx: mpsc::UnboundedReceiver<LogCommand>) {
    while let Some(command) = rx.recv().await {
        let record = match command {
            LogCommand::Record(record) => record,
            LogCommand::Flush(done) => {
                let _ = done.send(());
                continue;
            }
        };

        let written = match to_document(&*record) {
            Ok(doc) => sink.insert_one(doc).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(
                target: SINK_DIAGNOSTIC_TARGET,
                error = %e,
                collection = sink.name(),
                logger = %record.logger,
                "failed to persist log record"
            );
        }
    }
}

impl<S> Layer<S> for LogSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target() == SINK_DIAGNOSTIC_TARGET {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let thread = std::thread::current();
        let record = LogDocument {
            logger: meta.target().to_string(),
            level: meta.level().as_str().to_string(),
            message: visitor.message.unwrap_or_else(|| meta.name().to_string()),
            created_at: Utc::now(),
            pathname: meta.file().map(str::to_string),
            lineno: meta.line(),
            module: meta.module_path().map(str::to_string),
            function: ctx.event_span(event).map(|span| span.name().to_string()),
            process: std::process::id(),
            thread: format!("{:?}", thread.id()),
            thread_name: thread.name().map(str::to_string),
            fields: visitor.fields,
            exception: visitor.exception,
        };

        // Receiver gone means the runtime is shutting down.
        let _ = self.tx.send(LogCommand::Record(Box::new(record)));
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    exception: Option<String>,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn put(&mut self, field: &Field, rendered: String) {
        match field.name() {
            "message" => self.message = Some(rendered),
            "error" => self.exception = Some(rendered),
            name => {
                self.fields.insert(name.to_string(), rendered);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.put(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn Error + 'static)) {
        let mut rendered = value.to_string();
        let mut source = value.source();
        while let Some(cause) = source {
            rendered.push_str(": caused by: ");
            rendered.push_str(&cause.to_string());
            source = cause.source();
        }
        self.put(field, rendered);
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::time::Duration;

    use testkit::{EventCounter, MemorySink};
    use tracing::Level;
    use tracing_subscriber::layer::SubscriberExt;

    use super::*;

    fn capture(emit: impl FnOnce()) -> Vec<LogDocument> {
        let (layer, mut rx) = LogSinkLayer::channel();
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, emit);

        let mut out = Vec::new();
        while let Ok(command) = rx.try_recv() {
            if let LogCommand::Record(doc) = command {
                out.push(*doc);
            }
        }
        out
    }

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("upstream failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }

    impl Error for Inner {}

    #[test]
    fn event_becomes_document() {
        let docs = capture(|| {
            tracing::info_span!("get_news").in_scope(|| {
                tracing::info!(tag = "rust", per_page = 5, "fetching articles");
            });
        });

        assert_eq!(docs.len(), 1);
        let doc = &docs[0];
        assert_eq!(doc.level, "INFO");
        assert_eq!(doc.message, "fetching articles");
        assert_eq!(doc.logger, module_path!());
        assert_eq!(doc.module.as_deref(), Some(module_path!()));
        assert_eq!(doc.function.as_deref(), Some("get_news"));
        assert_eq!(doc.fields.get("tag").map(String::as_str), Some("rust"));
        assert_eq!(doc.fields.get("per_page").map(String::as_str), Some("5"));
        assert!(doc.pathname.as_deref().is_some_and(|p| p.ends_with("log.rs")));
        assert!(doc.lineno.is_some());
        assert_eq!(doc.process, std::process::id());
        assert!(doc.exception.is_none());
    }

    #[test]
    fn event_outside_span_has_no_function() {
        let docs = capture(|| tracing::warn!("plain"));
        assert_eq!(docs[0].level, "WARN");
        assert_eq!(docs[0].function, None);
    }

    #[test]
    fn error_field_is_rendered_with_causes() {
        let docs = capture(|| {
            let err = Outer(Inner);
            tracing::error!(error = &err as &(dyn Error + 'static), "request failed");
        });
        assert_eq!(
            docs[0].exception.as_deref(),
            Some("upstream failed: caused by: connection refused")
        );
        assert!(!docs[0].fields.contains_key("error"));
    }

    #[test]
    fn diagnostic_target_is_not_persisted() {
        let docs = capture(|| {
            tracing::warn!(target: SINK_DIAGNOSTIC_TARGET, "insert failed");
            tracing::info!("kept");
        });
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].message, "kept");
    }

    #[tokio::test]
    async fn writer_inserts_one_document_per_record() {
        let sink = MemorySink::new();
        let (layer, rx) = LogSinkLayer::channel();
        let writer = tokio::spawn(run_log_writer(sink.shared(), rx));

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("one");
            tracing::info!("two");
        });
        writer.await.unwrap();

        assert_eq!(sink.insert_calls(), 2);
        let docs = sink.documents();
        assert_eq!(docs[0].get_str("message").unwrap(), "one");
        assert!(docs[1].get_datetime("created_at").is_ok());
    }

    #[tokio::test]
    async fn failing_sink_keeps_writer_alive() {
        let counter = EventCounter::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(counter.clone()));

        let sink = MemorySink::failing();
        let (layer, rx) = LogSinkLayer::channel();
        let writer = tokio::spawn(run_log_writer(sink.shared(), rx));

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("first");
            tracing::error!("second");
        });
        writer.await.unwrap();

        assert_eq!(sink.insert_calls(), 2);
        assert!(sink.documents().is_empty());
        assert_eq!(counter.count_on(Level::WARN, SINK_DIAGNOSTIC_TARGET), 2);
    }

    #[tokio::test]
    async fn flush_waits_for_slow_sink() {
        let sink = MemorySink::with_delay(Duration::from_millis(2));
        let layer = LogSinkLayer::new(sink.shared());
        let handle = layer.handle();

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..50 {
                tracing::info!(i, "queued");
            }
        });
        handle.flush().await;

        assert_eq!(sink.documents().len(), 50);
    }

    #[tokio::test]
    async fn flush_returns_once_writer_is_gone() {
        let (layer, rx) = LogSinkLayer::channel();
        drop(rx);
        layer.handle().flush().await;
    }
}
