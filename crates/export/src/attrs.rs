use std::time::{SystemTime, UNIX_EPOCH};

use newsmirror_core::model::common::{AttributeValue, Attributes, ScopeDocument};
use opentelemetry::{Array, InstrumentationScope, KeyValue, Value};
use opentelemetry_sdk::Resource;

pub fn attribute_value(value: &Value) -> AttributeValue {
    match value {
        Value::Bool(v) => AttributeValue::Bool(*v),
        Value::I64(v) => AttributeValue::Int(*v),
        Value::F64(v) => AttributeValue::Double(*v),
        Value::String(v) => AttributeValue::String(v.as_str().to_string()),
        Value::Array(Array::Bool(v)) => AttributeValue::BoolList(v.clone()),
        Value::Array(Array::I64(v)) => AttributeValue::IntList(v.clone()),
        Value::Array(Array::F64(v)) => AttributeValue::DoubleList(v.clone()),
        Value::Array(Array::String(v)) => {
            AttributeValue::StringList(v.iter().map(|s| s.as_str().to_string()).collect())
        }
        #[allow(unreachable_patterns)]
        other => AttributeValue::String(other.to_string()),
    }
}

pub fn attributes<'a>(kvs: impl IntoIterator<Item = &'a KeyValue>) -> Attributes {
    kvs.into_iter()
        .map(|kv| (kv.key.as_str().to_string(), attribute_value(&kv.value)))
        .collect()
}

pub fn resource_attributes(resource: &Resource) -> Attributes {
    resource
        .iter()
        .map(|(k, v)| (k.as_str().to_string(), attribute_value(v)))
        .collect()
}

pub fn scope_document(scope: &InstrumentationScope) -> ScopeDocument {
    ScopeDocument {
        name: scope.name().to_string(),
        version: scope.version().map(str::to_string),
    }
}

pub fn unix_nanos(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
