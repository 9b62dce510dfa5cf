use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogDocument {
    pub logger: String,
    pub level: String,
    pub message: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub pathname: Option<String>,
    pub lineno: Option<u32>,
    pub module: Option<String>,
    /// Name of the innermost span the event was recorded in.
    pub function: Option<String>,
    pub process: u32,
    pub thread: String,
    pub thread_name: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub exception: Option<String>,
}
