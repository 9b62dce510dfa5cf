use newsmirror_core::error::Result;
use newsmirror_core::ids::{SpanId, TraceId};
use newsmirror_core::model::common::Attributes;
use newsmirror_core::model::span::{
    EventDocument, LinkContextDocument, LinkDocument, SpanContextDocument, SpanDocument, SpanKind,
    StatusCode, StatusDocument,
};
use newsmirror_core::model::to_document;
use newsmirror_store::SharedSink;
use opentelemetry::trace::{SpanId as OtelSpanId, SpanKind as OtelSpanKind, Status};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::error::{OTelSdkError, OTelSdkResult};
use opentelemetry_sdk::trace::{SpanData, SpanExporter};
use tokio::runtime::Handle;

use crate::attrs::{attributes, resource_attributes, scope_document, unix_nanos};
use crate::on_runtime;

/// Writes each batch handed over by the SDK batch processor as one bulk insert.
#[derive(Debug)]
pub struct DocumentSpanExporter {
    sink: SharedSink,
    runtime: Handle,
    resource: Attributes,
}

impl DocumentSpanExporter {
    pub fn new(sink: SharedSink, runtime: Handle) -> Self {
        Self {
            sink,
            runtime,
            resource: Attributes::new(),
        }
    }
}

impl SpanExporter for DocumentSpanExporter {
    async fn export(&self, batch: Vec<SpanData>) -> OTelSdkResult {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let written = match encode_batch(batch, &self.resource) {
            Ok(docs) => on_runtime(&self.runtime, self.sink.insert_many(docs)).await,
            Err(e) => Err(e),
        };

        written.map_err(|e| {
            tracing::error!(
                error = %e,
                spans = count,
                collection = self.sink.name(),
                "failed to export spans"
            );
            OTelSdkError::InternalFailure(e.to_string())
        })
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.resource = resource_attributes(resource);
    }
}

fn encode_batch(batch: Vec<SpanData>, resource: &Attributes) -> Result<Vec<bson::Document>> {
    batch
        .into_iter()
        .map(|span| to_document(&span_document(span, resource)))
        .collect()
}

pub fn span_document(span: SpanData, resource: &Attributes) -> SpanDocument {
    let ctx = &span.span_context;
    let parent_span_id = (span.parent_span_id != OtelSpanId::INVALID)
        .then(|| SpanId::from_bytes(span.parent_span_id.to_bytes()));

    let status = match &span.status {
        Status::Error { description } => StatusDocument {
            status_code: StatusCode::Error,
            description: Some(description.to_string()),
        },
        Status::Ok => StatusDocument {
            status_code: StatusCode::Ok,
            description: None,
        },
        Status::Unset => StatusDocument {
            status_code: StatusCode::Unset,
            description: None,
        },
    };

    SpanDocument {
        name: span.name.to_string(),
        context: SpanContextDocument {
            trace_id: TraceId::from_bytes(ctx.trace_id().to_bytes()),
            span_id: SpanId::from_bytes(ctx.span_id().to_bytes()),
            trace_state: ctx.trace_state().header(),
        },
        parent_span_id,
        kind: span_kind(&span.span_kind),
        start_time: unix_nanos(span.start_time),
        end_time: unix_nanos(span.end_time),
        status,
        attributes: attributes(&span.attributes),
        events: span
            .events
            .into_iter()
            .map(|event| EventDocument {
                name: event.name.to_string(),
                timestamp: unix_nanos(event.timestamp),
                attributes: attributes(&event.attributes),
            })
            .collect(),
        links: span
            .links
            .into_iter()
            .map(|link| LinkDocument {
                context: LinkContextDocument {
                    trace_id: TraceId::from_bytes(link.span_context.trace_id().to_bytes()),
                    span_id: SpanId::from_bytes(link.span_context.span_id().to_bytes()),
                },
                attributes: attributes(&link.attributes),
            })
            .collect(),
        instrumentation_scope: scope_document(&span.instrumentation_scope),
        resource: resource.clone(),
    }
}

fn span_kind(kind: &OtelSpanKind) -> SpanKind {
    match kind {
        OtelSpanKind::Server => SpanKind::Server,
        OtelSpanKind::Client => SpanKind::Client,
        OtelSpanKind::Producer => SpanKind::Producer,
        OtelSpanKind::Consumer => SpanKind::Consumer,
        OtelSpanKind::Internal => SpanKind::Internal,
    }
}
