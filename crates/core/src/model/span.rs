use serde::{Deserialize, Serialize};

use crate::ids::{SpanId, TraceId};
use crate::model::common::{Attributes, ScopeDocument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanDocument {
    pub name: String,
    pub context: SpanContextDocument,
    pub parent_span_id: Option<SpanId>,
    pub kind: SpanKind,
    /// Nanoseconds since the unix epoch.
    pub start_time: i64,
    pub end_time: i64,
    pub status: StatusDocument,
    pub attributes: Attributes,
    pub events: Vec<EventDocument>,
    pub links: Vec<LinkDocument>,
    pub instrumentation_scope: ScopeDocument,
    pub resource: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpanContextDocument {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub trace_state: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Unset,
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusDocument {
    pub status_code: StatusCode,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventDocument {
    pub name: String,
    pub timestamp: i64,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkDocument {
    pub context: LinkContextDocument,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkContextDocument {
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::common::AttributeValue;
    use crate::model::to_document;

    fn sample() -> SpanDocument {
        let mut attributes = Attributes::new();
        attributes.insert("devto.tag".into(), AttributeValue::String("rust".into()));
        attributes.insert("devto.per_page".into(), AttributeValue::Int(5));
        SpanDocument {
            name: "devto.fetch_articles".into(),
            context: SpanContextDocument {
                trace_id: TraceId::from_u128(7),
                span_id: SpanId::from_u64(9),
                trace_state: String::new(),
            },
            parent_span_id: None,
            kind: SpanKind::Client,
            start_time: 1_700_000_000_000_000_000,
            end_time: 1_700_000_000_500_000_000,
            status: StatusDocument {
                status_code: StatusCode::Unset,
                description: None,
            },
            attributes,
            events: vec![],
            links: vec![],
            instrumentation_scope: ScopeDocument {
                name: "newsmirror".into(),
                version: None,
            },
            resource: Attributes::new(),
        }
    }

    #[test]
    fn enums_render_symbolic_names() {
        let doc = to_document(&sample()).unwrap();
        assert_eq!(doc.get_str("kind").unwrap(), "CLIENT");
        let status = doc.get_document("status").unwrap();
        assert_eq!(status.get_str("status_code").unwrap(), "UNSET");
    }

    #[test]
    fn ids_are_plain_strings_in_document() {
        let doc = to_document(&sample()).unwrap();
        let ctx = doc.get_document("context").unwrap();
        assert_eq!(
            ctx.get_str("trace_id").unwrap(),
            "00000000000000000000000000000007"
        );
        assert_eq!(ctx.get_str("span_id").unwrap(), "0000000000000009");
        assert!(doc.get("parent_span_id").unwrap().as_null().is_some());
    }

    #[test]
    fn attributes_keep_scalar_types() {
        let doc = to_document(&sample()).unwrap();
        let attrs = doc.get_document("attributes").unwrap();
        assert_eq!(attrs.get_str("devto.tag").unwrap(), "rust");
        assert_eq!(attrs.get_i64("devto.per_page").unwrap(), 5);
    }
}
