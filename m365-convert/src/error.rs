//! Error types for the conversion engine.

use m365_model::ModelError;
use m365_types::AttrPath;
use thiserror::Error;

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Errors that abort a conversion. Every variant carries the attribute path.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The raw or typed value does not fit the declared attribute kind.
    #[error("at {path}: cannot convert {found} to {expected}")]
    TypeMismatch {
        path: AttrPath,
        expected: &'static str,
        found: &'static str,
    },

    /// A value translator recognized the value but failed to rewrite it.
    #[error("at {path}: {source}")]
    Translator {
        path: AttrPath,
        #[source]
        source: ModelError,
    },

    /// A JSON string attribute does not hold valid JSON.
    #[error("at {path}: invalid JSON: {source}")]
    InvalidJson {
        path: AttrPath,
        #[source]
        source: serde_json::Error,
    },

    /// More than one derived-type node of the same object is set.
    #[error("at {path}: both {first} and {second} are set, only one derived type may be used")]
    AmbiguousDerivedType {
        path: AttrPath,
        first: String,
        second: String,
    },

    /// A root value is not an object.
    #[error("expected an object at the root, found {0}")]
    NotAnObject(&'static str),
}

pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
