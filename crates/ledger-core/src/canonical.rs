//! Canonical payload encoding
//!
//! Payloads are hashed as compact JSON with a fixed shape:
//! - Object keys sorted lexicographically at every depth
//! - Array order preserved
//! - No insignificant whitespace
//!
//! Two semantically equal payloads therefore always produce the same bytes,
//! whatever order their producer inserted keys in.

use crate::error::Result;
use crate::types::Payload;
use serde::Serialize;
use serde_json::Value;

/// Convert any serializable value into a key-sorted JSON value.
pub fn to_canonical_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    Ok(sort_keys(serde_json::to_value(value)?))
}

/// Render a payload as canonical JSON text.
///
/// This is the normative encoding used by the content hash.
pub fn canonical_json(payload: &Payload) -> Result<String> {
    let canonical = sort_keys(payload.as_value().clone());
    Ok(serde_json::to_string(&canonical)?)
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(String, Value)> = map.into_iter().collect();
            fields.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(key, value)| (key, sort_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
