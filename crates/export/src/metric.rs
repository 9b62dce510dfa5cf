use std::future::Future;
use std::time::Duration;

use newsmirror_core::model::metric::{DataPoint, ExponentialBuckets, MetricDocument, Number};
use newsmirror_core::model::to_document;
use newsmirror_store::SharedSink;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::metrics::Temporality;
use opentelemetry_sdk::metrics::data::{AggregatedMetrics, Metric, MetricData, ResourceMetrics};
use opentelemetry_sdk::metrics::exporter::PushMetricExporter;
use tokio::runtime::Handle;

use crate::attrs::{attributes, resource_attributes, saturating_i64, scope_document, unix_nanos};
use crate::on_runtime;

/// Push exporter for the periodic reader: one document per metric per collection cycle.
#[derive(Debug)]
pub struct DocumentMetricExporter {
    sink: SharedSink,
    runtime: Handle,
}

impl DocumentMetricExporter {
    pub fn new(sink: SharedSink, runtime: Handle) -> Self {
        Self { sink, runtime }
    }

    pub async fn write(&self, docs: Vec<MetricDocument>) -> OTelSdkResult {
        if docs.is_empty() {
            return Ok(());
        }

        let count = docs.len();
        let encoded = docs
            .iter()
            .map(to_document)
            .collect::<newsmirror_core::Result<Vec<_>>>();
        let written = match encoded {
            Ok(encoded) => on_runtime(&self.runtime, self.sink.insert_many(encoded)).await,
            Err(e) => Err(e),
        };

        written.map_err(|e| {
            tracing::error!(
                error = %e,
                metrics = count,
                collection = self.sink.name(),
                "failed to export metrics"
            );
            OTelSdkError::InternalFailure(e.to_string())
        })
    }
}

impl PushMetricExporter for DocumentMetricExporter {
    fn export(&self, metrics: &ResourceMetrics) -> impl Future<Output = OTelSdkResult> + Send {
        let docs = metric_documents(metrics);
        self.write(docs)
    }

    fn force_flush(&self) -> OTelSdkResult {
        Ok(())
    }

    fn shutdown_with_timeout(&self, _timeout: Duration) -> OTelSdkResult {
        Ok(())
    }

    fn temporality(&self) -> Temporality {
        Temporality::Cumulative
    }
}

/// Flattens a collection into documents. Metrics without data points are skipped.
pub fn metric_documents(metrics: &ResourceMetrics) -> Vec<MetricDocument> {
    let resource = resource_attributes(metrics.resource());
    let mut docs = Vec::new();
    for scope in metrics.scope_metrics() {
        let instrumentation_scope = scope_document(scope.scope());
        for metric in scope.metrics() {
            let data = data_points(metric);
            if data.is_empty() {
                continue;
            }
            docs.push(MetricDocument {
                name: metric.name().to_string(),
                description: metric.description().to_string(),
                unit: metric.unit().to_string(),
                resource: resource.clone(),
                instrumentation_scope: instrumentation_scope.clone(),
                data,
            });
        }
    }
    docs
}

fn data_points(metric: &Metric) -> Vec<DataPoint> {
    match metric.data() {
        AggregatedMetrics::F64(data) => typed_points(data),
        AggregatedMetrics::U64(data) => typed_points(data),
        AggregatedMetrics::I64(data) => typed_points(data),
    }
}

fn typed_points<T: Copy + Into<Number>>(data: &MetricData<T>) -> Vec<DataPoint> {
    match data {
        MetricData::Sum(sum) => {
            let start = Some(unix_nanos(sum.start_time()));
            let time = unix_nanos(sum.time());
            sum.data_points()
                .map(|p| DataPoint::Sum {
                    start_time_unix_nano: start,
                    time_unix_nano: time,
                    attributes: attributes(p.attributes()),
                    value: p.value().into(),
                    is_monotonic: sum.is_monotonic(),
                })
                .collect()
        }
        MetricData::Gauge(gauge) => {
            let start = gauge.start_time().map(unix_nanos);
            let time = unix_nanos(gauge.time());
            gauge
                .data_points()
                .map(|p| DataPoint::Gauge {
                    start_time_unix_nano: start,
                    time_unix_nano: time,
                    attributes: attributes(p.attributes()),
                    value: p.value().into(),
                })
                .collect()
        }
        MetricData::Histogram(hist) => {
            let start = Some(unix_nanos(hist.start_time()));
            let time = unix_nanos(hist.time());
            hist.data_points()
                .map(|p| DataPoint::Histogram {
                    start_time_unix_nano: start,
                    time_unix_nano: time,
                    attributes: attributes(p.attributes()),
                    count: saturating_i64(p.count() as u64),
                    sum: p.sum().into(),
                    min: p.min().map(Into::into),
                    max: p.max().map(Into::into),
                    bucket_counts: p.bucket_counts().map(saturating_i64).collect(),
                    boundaries: p.bounds().collect(),
                })
                .collect()
        }
        MetricData::ExponentialHistogram(hist) => {
            let start = Some(unix_nanos(hist.start_time()));
            let time = unix_nanos(hist.time());
            hist.data_points()
                .map(|p| DataPoint::ExponentialHistogram {
                    start_time_unix_nano: start,
                    time_unix_nano: time,
                    attributes: attributes(p.attributes()),
                    count: saturating_i64(p.count() as u64),
                    sum: p.sum().into(),
                    min: p.min().map(Into::into),
                    max: p.max().map(Into::into),
                    scale: i32::from(p.scale()),
                    zero_count: saturating_i64(p.zero_count()),
                    zero_threshold: p.zero_threshold(),
                    positive: ExponentialBuckets {
                        offset: p.positive_bucket().offset(),
                        bucket_counts: p.positive_bucket().counts().map(saturating_i64).collect(),
                    },
                    negative: ExponentialBuckets {
                        offset: p.negative_bucket().offset(),
                        bucket_counts: p.negative_bucket().counts().map(saturating_i64).collect(),
                    },
                })
                .collect()
        }
    }
}
