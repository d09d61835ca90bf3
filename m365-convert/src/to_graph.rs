//! Typed tree to Graph JSON.
//!
//! The inverse of [`crate::graph_to_typed`]. Computed-only attributes are
//! never written, derived-type objects are flattened back onto their parent
//! with the discriminator re-inserted, and empty collections always become
//! `[]`.

use crate::error::{ConvertError, ConvertResult};
use m365_model::{AttributeKind, ObjectSchema, ResourceSchema, TranslatorTable, ODATA_TYPE};
use m365_types::{AttrPath, TypedValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Converts a typed tree into a Graph request body.
///
/// With `include_null` unset, null and unknown attributes are omitted
/// (partial update). With it set, they are sent as JSON `null` so a full
/// replace clears previously set values.
pub fn typed_to_graph(
    schema: &ResourceSchema,
    value: &TypedValue,
    include_null: bool,
) -> ConvertResult<Map<String, Value>> {
    object_to_graph(schema, schema.root(), &AttrPath::root(), value, include_null)
}

/// Converts a nested typed object using an attribute set of `schema`.
/// `path` must be the schema location of `object` so translators resolve.
pub fn object_to_graph(
    schema: &ResourceSchema,
    object: &ObjectSchema,
    path: &AttrPath,
    value: &TypedValue,
    include_null: bool,
) -> ConvertResult<Map<String, Value>> {
    let attrs = value
        .as_object()
        .ok_or(ConvertError::NotAnObject(value.kind_name()))?;
    let writer = Writer {
        translators: schema.translators(),
        include_null,
    };
    writer.object(object, path, attrs)
}

struct Writer<'a> {
    translators: &'a TranslatorTable,
    include_null: bool,
}

impl Writer<'_> {
    /// Returns `None` when the value is to be omitted from the body.
    fn value(&self, kind: &AttributeKind, path: &AttrPath, value: &TypedValue) -> ConvertResult<Option<Value>> {
        if let Some(translator) = self.translators.get(&path.schema_path()) {
            if let Some(result) = translator.to_graph(kind, value) {
                return result.map(Some).map_err(|source| ConvertError::Translator {
                    path: path.clone(),
                    source,
                });
            }
        }

        if value.is_null_or_unknown() {
            return Ok(self.include_null.then_some(Value::Null));
        }

        let converted = match (kind, value) {
            (AttributeKind::Bool, TypedValue::Bool(b)) => Value::Bool(*b),
            (AttributeKind::Number, TypedValue::Number(n)) => Value::Number(n.clone()),
            (AttributeKind::String, TypedValue::String(s)) => Value::String(s.clone()),
            (AttributeKind::JsonString, TypedValue::String(s)) => {
                serde_json::from_str(s).map_err(|source| ConvertError::InvalidJson {
                    path: path.clone(),
                    source,
                })?
            }
            (AttributeKind::List(element), TypedValue::List(items))
            | (AttributeKind::Set(element), TypedValue::Set(items)) => {
                let mut array = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let converted = self.value(element, &path.join_index(i), item)?;
                    array.push(converted.unwrap_or(Value::Null));
                }
                Value::Array(array)
            }
            (
                AttributeKind::Object(attributes) | AttributeKind::DerivedTypeObject { attributes, .. },
                TypedValue::Object(attrs),
            ) => Value::Object(self.object(attributes, path, attrs)?),
            (AttributeKind::Map(element), TypedValue::Map(entries)) => {
                let mut map = Map::new();
                for (key, item) in entries {
                    if let Some(converted) = self.value(element, &path.join_key(key.clone()), item)? {
                        map.insert(key.clone(), converted);
                    }
                }
                Value::Object(map)
            }
            _ => {
                return Err(ConvertError::TypeMismatch {
                    path: path.clone(),
                    expected: kind.name(),
                    found: value.kind_name(),
                });
            }
        };
        Ok(Some(converted))
    }

    fn object(
        &self,
        schema: &ObjectSchema,
        path: &AttrPath,
        attrs: &BTreeMap<String, TypedValue>,
    ) -> ConvertResult<Map<String, Value>> {
        let mut out = Map::new();
        let mut active: Option<(&str, &str)> = None;

        for attribute in schema.attributes() {
            if !attribute.mode.is_writable() {
                continue;
            }
            let value = attrs.get(&attribute.name).unwrap_or(TypedValue::null_ref());
            let child_path = path.join_attr(attribute.name.clone());

            match &attribute.kind {
                AttributeKind::DerivedTypeObject { odata_type, attributes } => {
                    // Inactive variants leave no trace in the body.
                    let Some(inner) = value.as_object() else {
                        continue;
                    };
                    if let Some((first, _)) = active {
                        return Err(ConvertError::AmbiguousDerivedType {
                            path: path.clone(),
                            first: first.to_string(),
                            second: attribute.name.clone(),
                        });
                    }
                    active = Some((&attribute.name, odata_type));
                    out.extend(self.object(attributes, &child_path, inner)?);
                }
                kind => {
                    if let Some(converted) = self.value(kind, &child_path, value)? {
                        out.insert(attribute.graph_key().into_owned(), converted);
                    }
                }
            }
        }

        if let Some((_, odata_type)) = active {
            out.insert(ODATA_TYPE.to_string(), Value::String(odata_type.to_string()));
        }
        Ok(out)
    }
}
