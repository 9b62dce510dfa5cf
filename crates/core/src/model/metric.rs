use serde::{Deserialize, Serialize};

use crate::model::common::{Attributes, ScopeDocument};

/// One metric of one scope of one resource, as collected in a single export interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDocument {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub resource: Attributes,
    pub instrumentation_scope: ScopeDocument,
    pub data: Vec<DataPoint>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Double(f64),
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataPoint {
    Sum {
        start_time_unix_nano: Option<i64>,
        time_unix_nano: i64,
        attributes: Attributes,
        value: Number,
        is_monotonic: bool,
    },
    Gauge {
        start_time_unix_nano: Option<i64>,
        time_unix_nano: i64,
        attributes: Attributes,
        value: Number,
    },
    Histogram {
        start_time_unix_nano: Option<i64>,
        time_unix_nano: i64,
        attributes: Attributes,
        count: i64,
        sum: Number,
        min: Option<Number>,
        max: Option<Number>,
        bucket_counts: Vec<i64>,
        boundaries: Vec<f64>,
    },
    ExponentialHistogram {
        start_time_unix_nano: Option<i64>,
        time_unix_nano: i64,
        attributes: Attributes,
        count: i64,
        sum: Number,
        min: Option<Number>,
        max: Option<Number>,
        scale: i32,
        zero_count: i64,
        zero_threshold: f64,
        positive: ExponentialBuckets,
        negative: ExponentialBuckets,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExponentialBuckets {
    pub offset: i32,
    pub bucket_counts: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::to_document;

    fn metric(data: Vec<DataPoint>) -> MetricDocument {
        MetricDocument {
            name: "devto.news.requests".into(),
            description: "Number of calls to the /news endpoint".into(),
            unit: String::new(),
            resource: Attributes::new(),
            instrumentation_scope: ScopeDocument {
                name: "newsmirror".into(),
                version: Some("0.1.0".into()),
            },
            data,
        }
    }

    #[test]
    fn sum_point_carries_single_value() {
        let doc = to_document(&metric(vec![DataPoint::Sum {
            start_time_unix_nano: Some(1),
            time_unix_nano: 2,
            attributes: Attributes::new(),
            value: Number::from(3u64),
            is_monotonic: true,
        }]))
        .unwrap();

        let points = doc.get_array("data").unwrap();
        let point = points[0].as_document().unwrap();
        assert_eq!(point.get_str("kind").unwrap(), "sum");
        assert_eq!(point.get_i64("value").unwrap(), 3);
        assert!(point.get("count").is_none());
        assert!(point.get("bucket_counts").is_none());
    }

    #[test]
    fn histogram_point_carries_distribution_fields() {
        let doc = to_document(&metric(vec![DataPoint::Histogram {
            start_time_unix_nano: Some(1),
            time_unix_nano: 2,
            attributes: Attributes::new(),
            count: 4,
            sum: Number::from(10.5),
            min: Some(Number::from(0.5)),
            max: Some(Number::from(7.0)),
            bucket_counts: vec![1, 2, 1],
            boundaries: vec![1.0, 5.0],
        }]))
        .unwrap();

        let point = doc.get_array("data").unwrap()[0]
            .as_document()
            .unwrap()
            .clone();
        assert_eq!(point.get_str("kind").unwrap(), "histogram");
        assert_eq!(point.get_i64("count").unwrap(), 4);
        assert_eq!(point.get_f64("sum").unwrap(), 10.5);
        assert_eq!(point.get_array("bucket_counts").unwrap().len(), 3);
        assert_eq!(point.get_array("boundaries").unwrap().len(), 2);
        assert!(point.get("value").is_none());
    }

    #[test]
    fn oversized_unsigned_values_saturate() {
        assert_eq!(Number::from(u64::MAX), Number::Int(i64::MAX));
    }
}
