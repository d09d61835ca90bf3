//! Per-path value translators.
//!
//! A translator rewrites values whose Graph encoding differs from the typed
//! encoding (base64 payloads, sentinel enum values, absent-means-default).
//! Translators live in a side table keyed by schema path; the conversion
//! engine asks the table before applying its generic rules.

use crate::error::{ModelError, ModelResult};
use crate::schema::AttributeKind;
use base64::{Engine, engine::general_purpose::STANDARD};
use m365_types::TypedValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A Graph-side value as seen by a translator.
///
/// A property absent from the payload is `Missing`; a property present with
/// JSON `null` is `Present(Value::Null)`.
#[derive(Debug, Clone, Copy)]
pub enum GraphInput<'a> {
    Missing,
    Present(&'a serde_json::Value),
}

/// Bidirectional value rewrite rule attached to a schema path.
///
/// Returning `None` means "not recognized"; the engine then applies its
/// generic conversion.
pub trait ValueTranslator: Send + Sync + fmt::Debug {
    /// Graph value to typed value.
    fn to_typed(
        &self,
        kind: &AttributeKind,
        input: GraphInput<'_>,
    ) -> Option<ModelResult<TypedValue>>;

    /// Typed value to Graph value.
    fn to_graph(
        &self,
        kind: &AttributeKind,
        value: &TypedValue,
    ) -> Option<ModelResult<serde_json::Value>>;
}

/// Side table from dotted schema path to translator.
#[derive(Debug, Clone, Default)]
pub struct TranslatorTable {
    entries: HashMap<String, Arc<dyn ValueTranslator>>,
}

impl TranslatorTable {
    pub fn insert(&mut self, schema_path: impl Into<String>, translator: Arc<dyn ValueTranslator>) {
        self.entries.insert(schema_path.into(), translator);
    }

    pub fn get(&self, schema_path: &str) -> Option<&Arc<dyn ValueTranslator>> {
        self.entries.get(schema_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Graph carries the value base64-encoded; the typed tree holds plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64String;

impl ValueTranslator for Base64String {
    fn to_typed(
        &self,
        _kind: &AttributeKind,
        input: GraphInput<'_>,
    ) -> Option<ModelResult<TypedValue>> {
        let GraphInput::Present(serde_json::Value::String(encoded)) = input else {
            return None;
        };
        let decoded = STANDARD
            .decode(encoded)
            .map_err(|e| ModelError::translation("base64", format!("invalid base64: {e}")))
            .and_then(|bytes| {
                String::from_utf8(bytes)
                    .map_err(|e| ModelError::translation("base64", format!("invalid UTF-8: {e}")))
            });
        Some(decoded.map(TypedValue::String))
    }

    fn to_graph(
        &self,
        _kind: &AttributeKind,
        value: &TypedValue,
    ) -> Option<ModelResult<serde_json::Value>> {
        let plain = value.as_str()?;
        Some(Ok(serde_json::Value::String(STANDARD.encode(plain))))
    }
}

/// Graph serializes Int64 properties as JSON strings; the typed tree holds
/// numbers. Numbers are written back as strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Int64String;

impl ValueTranslator for Int64String {
    fn to_typed(
        &self,
        _kind: &AttributeKind,
        input: GraphInput<'_>,
    ) -> Option<ModelResult<TypedValue>> {
        let GraphInput::Present(serde_json::Value::String(raw)) = input else {
            return None;
        };
        let parsed = raw
            .parse::<i64>()
            .map(TypedValue::number)
            .map_err(|e| ModelError::translation("int64", format!("invalid Int64 {raw:?}: {e}")));
        Some(parsed)
    }

    fn to_graph(
        &self,
        _kind: &AttributeKind,
        value: &TypedValue,
    ) -> Option<ModelResult<serde_json::Value>> {
        let number = value.as_number()?;
        Some(Ok(serde_json::Value::String(number.to_string())))
    }
}

/// Table-driven mapping between specific Graph values and typed values,
/// e.g. Graph `"notConfigured"` as typed null.
#[derive(Debug, Clone, Default)]
pub struct EnumMap {
    pairs: Vec<(serde_json::Value, TypedValue)>,
}

impl EnumMap {
    pub fn new(pairs: Vec<(serde_json::Value, TypedValue)>) -> Self {
        Self { pairs }
    }
}

impl ValueTranslator for EnumMap {
    fn to_typed(
        &self,
        _kind: &AttributeKind,
        input: GraphInput<'_>,
    ) -> Option<ModelResult<TypedValue>> {
        let GraphInput::Present(raw) = input else {
            return None;
        };
        self.pairs
            .iter()
            .find(|(graph, _)| graph == raw)
            .map(|(_, typed)| Ok(typed.clone()))
    }

    fn to_graph(
        &self,
        _kind: &AttributeKind,
        value: &TypedValue,
    ) -> Option<ModelResult<serde_json::Value>> {
        self.pairs
            .iter()
            .find(|(_, typed)| typed == value)
            .map(|(graph, _)| Ok(graph.clone()))
    }
}

/// Substitutes a typed default when Graph omits the property, and
/// optionally when it sends an explicit `null`.
#[derive(Debug, Clone)]
pub struct MissingAsDefault {
    default: TypedValue,
    include_null: bool,
}

impl MissingAsDefault {
    /// Applies only when the property is absent.
    pub fn new(default: TypedValue) -> Self {
        Self {
            default,
            include_null: false,
        }
    }

    /// Applies when the property is absent or `null`.
    pub fn or_null(default: TypedValue) -> Self {
        Self {
            default,
            include_null: true,
        }
    }
}

impl ValueTranslator for MissingAsDefault {
    fn to_typed(
        &self,
        _kind: &AttributeKind,
        input: GraphInput<'_>,
    ) -> Option<ModelResult<TypedValue>> {
        match input {
            GraphInput::Missing => Some(Ok(self.default.clone())),
            GraphInput::Present(serde_json::Value::Null) if self.include_null => {
                Some(Ok(self.default.clone()))
            }
            GraphInput::Present(_) => None,
        }
    }

    fn to_graph(
        &self,
        _kind: &AttributeKind,
        _value: &TypedValue,
    ) -> Option<ModelResult<serde_json::Value>> {
        None
    }
}
