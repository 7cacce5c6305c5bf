//! Strict shape validation for dynamically-typed JSON values.
//!
//! The remote API hands back `serde_json::Value` trees; before anything is
//! imported, each value is checked against the exact shape the pipeline
//! expects. Validation never coerces (a string is never read as a number),
//! and a mismatch reports both the expected and the observed shape.

use serde_json::{Map, Value};
use thiserror::Error;

/// Runtime shape of a JSON value, used in decode diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
    /// An array whose every element is an object.
    ObjectArray,
    String,
    Number,
    Bool,
    Null,
}

impl JsonShape {
    /// Classify the runtime shape of a value.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => JsonShape::Object,
            Value::Array(_) => JsonShape::Array,
            Value::String(_) => JsonShape::String,
            Value::Number(_) => JsonShape::Number,
            Value::Bool(_) => JsonShape::Bool,
            Value::Null => JsonShape::Null,
        }
    }
}

impl std::fmt::Display for JsonShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JsonShape::Object => "object",
            JsonShape::Array => "array",
            JsonShape::ObjectArray => "array of objects",
            JsonShape::String => "string",
            JsonShape::Number => "number",
            JsonShape::Bool => "bool",
            JsonShape::Null => "null",
        };
        f.write_str(name)
    }
}

/// A value did not match the shape the pipeline expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected}, got {actual}")]
pub struct DecodeError {
    pub expected: JsonShape,
    pub actual: JsonShape,
}

/// Require a JSON object.
pub fn expect_object(value: &Value) -> Result<&Map<String, Value>, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError {
            expected: JsonShape::Object,
            actual: JsonShape::of(other),
        }),
    }
}

/// Require an array whose every element is an object.
///
/// The first non-object element fails the whole array.
pub fn expect_object_array(value: &Value) -> Result<Vec<Map<String, Value>>, DecodeError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(DecodeError {
                expected: JsonShape::ObjectArray,
                actual: JsonShape::of(other),
            })
        }
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map.clone()),
            other => Err(DecodeError {
                expected: JsonShape::ObjectArray,
                actual: JsonShape::of(other),
            }),
        })
        .collect()
}

/// Decode one page of the remote collection: a top-level object whose
/// `"results"` field is an array of objects.
///
/// An absent `"results"` field is reported with an actual shape of `Null`.
pub fn decode_collection(value: &Value) -> Result<Vec<Map<String, Value>>, DecodeError> {
    let page = expect_object(value)?;
    let results = page.get("results").unwrap_or(&Value::Null);
    expect_object_array(results)
}
