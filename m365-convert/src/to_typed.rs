//! Graph JSON to typed tree.
//!
//! Walks the schema and the raw payload together. For every node the
//! translator side table is consulted first; only unrecognized values fall
//! through to the kind-driven rules. Graph's flat polymorphic encoding is
//! turned into nested derived-type objects on the way.

use crate::error::{json_kind, ConvertError, ConvertResult};
use m365_model::{
    Attribute, AttributeKind, GraphInput, ObjectSchema, ResourceSchema, TranslatorTable, ODATA_TYPE,
};
use m365_types::{AttrPath, TypedValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Converts a raw Graph object into the typed tree described by `schema`.
///
/// Unknown Graph properties are dropped (logged at debug); schema attributes
/// the payload does not carry become null unless a translator supplies a
/// value for the missing case.
pub fn graph_to_typed(schema: &ResourceSchema, raw: &Map<String, Value>) -> ConvertResult<TypedValue> {
    let walker = Walker {
        translators: Some(schema.translators()),
        naming: Naming::Graph,
    };
    walker.object(schema.root(), &AttrPath::root(), raw)
}

/// Converts a nested raw Graph object using an attribute set of `schema`,
/// e.g. a single element of a child collection.
pub fn object_to_typed(
    schema: &ResourceSchema,
    object: &ObjectSchema,
    path: &AttrPath,
    raw: &Map<String, Value>,
) -> ConvertResult<TypedValue> {
    let walker = Walker {
        translators: Some(schema.translators()),
        naming: Naming::Graph,
    };
    walker.object(object, path, raw)
}

/// Converts a raw JSON literal whose object keys are already local attribute
/// names. Used for plan-time defaults; no translators, no renaming.
pub fn literal_to_typed(kind: &AttributeKind, path: &AttrPath, literal: &Value) -> ConvertResult<TypedValue> {
    let walker = Walker {
        translators: None,
        naming: Naming::Local,
    };
    walker.value(kind, path, GraphInput::Present(literal))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Naming {
    Graph,
    Local,
}

struct Walker<'a> {
    translators: Option<&'a TranslatorTable>,
    naming: Naming,
}

impl Walker<'_> {
    fn value(&self, kind: &AttributeKind, path: &AttrPath, input: GraphInput<'_>) -> ConvertResult<TypedValue> {
        if let Some(translator) = self.translators.and_then(|t| t.get(&path.schema_path())) {
            if let Some(result) = translator.to_typed(kind, input) {
                return result.map_err(|source| ConvertError::Translator {
                    path: path.clone(),
                    source,
                });
            }
        }

        let raw = match input {
            GraphInput::Missing | GraphInput::Present(Value::Null) => return Ok(TypedValue::Null),
            GraphInput::Present(raw) => raw,
        };

        match (kind, raw) {
            (AttributeKind::Bool, Value::Bool(b)) => Ok(TypedValue::Bool(*b)),
            (AttributeKind::Number, Value::Number(n)) => Ok(TypedValue::Number(n.clone())),
            // Graph serializes Int64 properties as strings. `Int64String` keeps
            // that encoding on the way back.
            (AttributeKind::Number, Value::String(s)) => s
                .parse::<serde_json::Number>()
                .map(TypedValue::Number)
                .map_err(|_| mismatch(path, kind, raw)),
            (AttributeKind::String | AttributeKind::JsonString, Value::String(s)) => {
                Ok(TypedValue::String(s.clone()))
            }
            (AttributeKind::String | AttributeKind::JsonString, Value::Object(_) | Value::Array(_)) => {
                Ok(TypedValue::String(raw.to_string()))
            }
            (AttributeKind::List(element), Value::Array(items)) => {
                Ok(TypedValue::List(self.elements(element, path, items)?))
            }
            (AttributeKind::Set(element), Value::Array(items)) => {
                Ok(TypedValue::Set(self.elements(element, path, items)?))
            }
            (
                AttributeKind::Object(attributes) | AttributeKind::DerivedTypeObject { attributes, .. },
                Value::Object(map),
            ) => self.object(attributes, path, map),
            (AttributeKind::Map(element), Value::Object(map)) => {
                let mut entries = BTreeMap::new();
                for (key, item) in map {
                    let converted = self.value(element, &path.join_key(key.clone()), GraphInput::Present(item))?;
                    entries.insert(key.clone(), converted);
                }
                Ok(TypedValue::Map(entries))
            }
            _ => Err(mismatch(path, kind, raw)),
        }
    }

    fn elements(&self, element: &AttributeKind, path: &AttrPath, items: &[Value]) -> ConvertResult<Vec<TypedValue>> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.value(element, &path.join_index(i), GraphInput::Present(item)))
            .collect()
    }

    fn object(&self, schema: &ObjectSchema, path: &AttrPath, raw: &Map<String, Value>) -> ConvertResult<TypedValue> {
        let mut result = BTreeMap::new();
        let mut remaining: Vec<(&String, &Value)> = raw.iter().collect();

        // Relocate the properties owned by the active derived type into its
        // own nested object.
        let active = raw
            .get(ODATA_TYPE)
            .and_then(Value::as_str)
            .and_then(|tag| schema.derived_type_for(tag));
        if let Some(node) = active {
            if let Some(owned) = node.kind.object_schema() {
                let mut sub = Map::new();
                remaining.retain(|(key, value)| {
                    let is_owned = owned.attributes().iter().any(|a| self.key_of(a) == key.as_str());
                    if is_owned {
                        sub.insert((*key).clone(), (*value).clone());
                    }
                    !is_owned
                });
                let node_path = path.join_attr(node.name.clone());
                result.insert(node.name.clone(), self.object(owned, &node_path, &sub)?);
            }
        }

        for (key, value) in remaining {
            let attribute = match self.naming {
                Naming::Graph => schema.find_by_graph_key(key),
                Naming::Local => schema.get(key),
            };
            let Some(attribute) = attribute else {
                if key != ODATA_TYPE {
                    debug!(path = %path, key = %key, "dropping unmapped property");
                }
                continue;
            };
            let child_path = path.join_attr(attribute.name.clone());
            let converted = self.value(&attribute.kind, &child_path, GraphInput::Present(value))?;
            result.insert(attribute.name.clone(), converted);
        }

        for attribute in schema.attributes() {
            if result.contains_key(&attribute.name) {
                continue;
            }
            let child_path = path.join_attr(attribute.name.clone());
            let converted = self.value(&attribute.kind, &child_path, GraphInput::Missing)?;
            result.insert(attribute.name.clone(), converted);
        }

        Ok(TypedValue::Object(result))
    }

    fn key_of(&self, attribute: &Attribute) -> String {
        match self.naming {
            Naming::Graph => attribute.graph_key().into_owned(),
            Naming::Local => attribute.name.clone(),
        }
    }
}

fn mismatch(path: &AttrPath, kind: &AttributeKind, raw: &Value) -> ConvertError {
    ConvertError::TypeMismatch {
        path: path.clone(),
        expected: kind.name(),
        found: json_kind(raw),
    }
}
