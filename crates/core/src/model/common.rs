use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// String-keyed attribute map. Values are scalars or homogeneous lists, never nested maps.
pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    BoolList(Vec<bool>),
    IntList(Vec<i64>),
    DoubleList(Vec<f64>),
    StringList(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeDocument {
    pub name: String,
    pub version: Option<String>,
}
