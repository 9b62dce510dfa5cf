use std::io::IsTerminal;
use std::sync::Once;

use newsmirror_core::config::Config;
use newsmirror_export::{
    DocumentMetricExporter, DocumentSpanExporter, LogSinkHandle, LogSinkLayer,
};
use newsmirror_store::Store;
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::trace::TracerProvider;
use opentelemetry::{KeyValue, global};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;
use tokio::runtime::Handle;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const SCOPE: &str = "newsmirror";

const QUIET_TARGETS: &str =
    "hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,opentelemetry_sdk=warn";

static GLOBALS: Once = Once::new();

/// Providers for the process. Handed to the router so handlers never reach for globals.
pub struct Telemetry {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    log_sink: Option<LogSinkHandle>,
    store: Option<Store>,
}

impl Telemetry {
    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(SCOPE)
    }

    /// False when the database was unreachable at startup and telemetry is discarded.
    pub fn is_persisting(&self) -> bool {
        self.store.is_some()
    }

    pub async fn shutdown(self) {
        let Self {
            tracer_provider,
            meter_provider,
            log_sink,
            store,
        } = self;

        // Provider shutdown blocks on the exporter threads, which write through this runtime.
        let flushed = tokio::task::spawn_blocking(move || {
            if let Err(e) = tracer_provider.shutdown() {
                tracing::warn!(error = %e, "tracer provider shutdown failed");
            }
            if let Err(e) = meter_provider.shutdown() {
                tracing::warn!(error = %e, "meter provider shutdown failed");
            }
        })
        .await;
        if let Err(e) = flushed {
            tracing::warn!(error = %e, "telemetry shutdown task failed");
        }

        if let Some(log_sink) = log_sink {
            log_sink.flush().await;
        }
        if let Some(store) = store {
            store.shutdown().await;
        }
    }
}

pub fn env_filter(cfg: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},{QUIET_TARGETS}", cfg.level_directive())))
}

/// Console-only logging for one-shot commands.
pub fn init_cli_tracing(cfg: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(cfg))
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Connects to the telemetry database and installs logging, tracing and metrics.
/// An unreachable database leaves console logging only, for the life of the process.
pub async fn init(cfg: &Config) -> Telemetry {
    let connected = Store::connect(&cfg.mongo).await;
    let resource = resource(cfg);
    let runtime = Handle::current();

    let (store, unavailable) = match connected {
        Ok(store) => (Some(store), None),
        Err(e) => (None, Some(e)),
    };

    let mut tracer_builder = SdkTracerProvider::builder().with_resource(resource.clone());
    let mut meter_builder = SdkMeterProvider::builder().with_resource(resource);
    if let Some(store) = &store {
        tracer_builder = tracer_builder.with_batch_exporter(DocumentSpanExporter::new(
            store.traces().shared(),
            runtime.clone(),
        ));
        let reader = PeriodicReader::builder(DocumentMetricExporter::new(
            store.metrics().shared(),
            runtime,
        ))
        .with_interval(cfg.metric_export_interval)
        .build();
        meter_builder = meter_builder.with_reader(reader);
    }
    let tracer_provider = tracer_builder.build();
    let meter_provider = meter_builder.build();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .compact();
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer(SCOPE));
    let sink_layer = store
        .as_ref()
        .map(|store| LogSinkLayer::new(store.logs().shared()));
    let log_sink = sink_layer.as_ref().map(LogSinkLayer::handle);

    let _ = tracing_subscriber::registry()
        .with(env_filter(cfg))
        .with(fmt_layer)
        .with(otel_layer)
        .with(sink_layer)
        .try_init();

    GLOBALS.call_once(|| {
        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());
    });

    match unavailable {
        Some(e) => tracing::warn!(
            error = %e,
            "telemetry database unavailable, logs, traces and metrics will be discarded"
        ),
        None => tracing::info!(
            db = %cfg.mongo.db_name,
            logs = %cfg.mongo.log_collection,
            traces = %cfg.mongo.trace_collection,
            metrics = %cfg.mongo.metric_collection,
            "telemetry persisted to mongodb"
        ),
    }

    Telemetry {
        tracer_provider,
        meter_provider,
        log_sink,
        store,
    }
}

fn resource(cfg: &Config) -> Resource {
    Resource::builder()
        .with_service_name(cfg.service.name.clone())
        .with_attributes([
            KeyValue::new("service.version", cfg.service.version.clone()),
            KeyValue::new("service.instance.id", cfg.service.instance_id.clone()),
        ])
        .build()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use newsmirror_core::config::MongoConfig;
    use testkit::MemorySink;

    use super::*;

    #[test]
    fn resource_carries_service_identity() {
        let cfg = Config::default();
        let resource = resource(&cfg);
        let get = |key: &'static str| {
            resource
                .get(&opentelemetry::Key::from_static_str(key))
                .map(|v| v.to_string())
        };
        assert_eq!(get("service.name").as_deref(), Some("devto-news-service"));
        assert_eq!(get("service.version").as_deref(), Some("1.0.0"));
        assert_eq!(get("service.instance.id").as_deref(), Some("local-instance"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_database_falls_back_to_console() {
        let cfg = Config {
            mongo: MongoConfig {
                uri: Some("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200".into()),
                ..MongoConfig::default()
            },
            ..Config::default()
        };

        let telemetry = init(&cfg).await;
        assert!(!telemetry.is_persisting());

        let counter = telemetry.meter().u64_counter("devto.news.requests").build();
        counter.add(1, &[KeyValue::new("tag", "rust")]);
        tracing::info!("still logs to the console");

        tokio::time::timeout(Duration::from_secs(10), telemetry.shutdown())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn shutdown_waits_for_queued_log_records() {
        let sink = MemorySink::with_delay(Duration::from_millis(2));
        let layer = LogSinkLayer::new(sink.shared());
        let telemetry = Telemetry {
            tracer_provider: SdkTracerProvider::builder().build(),
            meter_provider: SdkMeterProvider::builder().build(),
            log_sink: Some(layer.handle()),
            store: None,
        };

        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            for i in 0..51 {
                tracing::info!(i, "request served");
            }
        });
        telemetry.shutdown().await;

        assert_eq!(sink.documents().len(), 51);
    }
}
