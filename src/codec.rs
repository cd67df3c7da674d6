//! Decoding of raw document payloads.

use serde_json::Value;
use thiserror::Error;

use crate::record::Record;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("expected a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("revision field `{field}` is missing")]
    MissingRevision { field: String },

    #[error("revision field `{field}` is not a scalar (found {found})")]
    InvalidRevision { field: String, found: &'static str },
}

/// Turns store payloads into [`Record`]s, keeping every field the document
/// carries (including store-internal ones).
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCodec;

impl DocumentCodec {
    pub fn new() -> Self {
        DocumentCodec
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Record, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        into_record(value)
    }

    pub fn decode_str(&self, text: &str) -> Result<Record, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        into_record(value)
    }

    /// The revision token stored under `field`, in text form.
    pub fn revision(&self, record: &Record, field: &str) -> Result<String, CodecError> {
        match record.get(field) {
            None => Err(CodecError::MissingRevision {
                field: field.to_string(),
            }),
            Some(Value::String(rev)) => Ok(rev.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(other) => Err(CodecError::InvalidRevision {
                field: field.to_string(),
                found: kind(other),
            }),
        }
    }
}

fn into_record(value: Value) -> Result<Record, CodecError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CodecError::NotAnObject { found: kind(&other) }),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
