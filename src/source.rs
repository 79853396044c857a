//! Raw family sources
//!
//! Locating and reading schema sources is the caller's job; these helpers only
//! cover the last mile: reading one JSON document and picking the family value
//! out of it by field name.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Default field of a document that holds the family value
pub const DEFAULT_FAMILY_FIELD: &str = "dashboardFamily";

/// Read a JSON document from disk
pub fn read_document(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let document = serde_json::from_str(&content)?;
    debug!(path = %path.display(), "read family document");
    Ok(document)
}

/// Find the family value in a document.
///
/// `document` may be a single object, or a list of objects (one per loaded
/// instance); the first object carrying `field` wins.
pub fn find_family<'a>(document: &'a Value, field: &str) -> Option<&'a Value> {
    match document {
        Value::Object(map) => map.get(field),
        Value::Array(instances) => instances.iter().find_map(|inst| inst.get(field)),
        _ => None,
    }
}
