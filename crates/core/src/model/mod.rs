pub mod article;
pub mod common;
pub mod log;
pub mod metric;
pub mod span;

use bson::Document;
use serde::Serialize;

use crate::error::{MirrorError, Result};

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    bson::to_document(value).map_err(|e| MirrorError::Encode(format!("bson encode failed: {e}")))
}
