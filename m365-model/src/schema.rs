use crate::error::{ModelError, ModelResult};
use crate::translator::{TranslatorTable, ValueTranslator};
use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;

/// Whether the practitioner, the server, or both set an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeMode {
    Required,
    Optional,
    /// Optional in config, filled by the server when omitted.
    OptionalComputed,
    /// Server-assigned only; never sent back to Graph.
    Computed,
}

impl AttributeMode {
    /// Returns true if the attribute may be sent in a request body.
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::Computed)
    }
}

/// The shape of an attribute.
///
/// Both conversion directions match exhaustively on this enum, so a new
/// shape cannot be added without handling it everywhere.
#[derive(Debug, Clone)]
pub enum AttributeKind {
    Bool,
    Number,
    String,
    /// A string attribute holding a JSON document that Graph exchanges as a
    /// nested object or array.
    JsonString,
    List(Box<AttributeKind>),
    Set(Box<AttributeKind>),
    Object(ObjectSchema),
    /// A nested object that only has content when the parent's `@odata.type`
    /// equals `odata_type`. Graph encodes its attributes flat on the parent.
    DerivedTypeObject {
        odata_type: String,
        attributes: ObjectSchema,
    },
    /// A map with arbitrary keys, preserved verbatim.
    Map(Box<AttributeKind>),
}

impl AttributeKind {
    pub fn list(element: AttributeKind) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: AttributeKind) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn map(element: AttributeKind) -> Self {
        Self::Map(Box::new(element))
    }

    pub fn object(attributes: Vec<Attribute>) -> Self {
        Self::Object(ObjectSchema::new(attributes))
    }

    pub fn derived(odata_type: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self::DerivedTypeObject {
            odata_type: odata_type.into(),
            attributes: ObjectSchema::new(attributes),
        }
    }

    /// Returns the nested attribute set of an object-like kind.
    pub fn object_schema(&self) -> Option<&ObjectSchema> {
        match self {
            Self::Object(attributes) | Self::DerivedTypeObject { attributes, .. } => {
                Some(attributes)
            }
            _ => None,
        }
    }

    /// Returns the element kind of a list, set or map.
    pub fn element(&self) -> Option<&AttributeKind> {
        match self {
            Self::List(element) | Self::Set(element) | Self::Map(element) => Some(element),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Number => "number",
            Self::String => "string",
            Self::JsonString => "json string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Object(_) => "object",
            Self::DerivedTypeObject { .. } => "derived type object",
            Self::Map(_) => "map",
        }
    }
}

/// A named node of the schema tree.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub mode: AttributeMode,
    /// Graph property name when it is not the camelCase form of `name`.
    pub graph_name: Option<String>,
    /// Plan-time default, as a raw JSON literal.
    pub default: Option<serde_json::Value>,
    /// Changing the value after creation has no effect on the server.
    pub immutable: bool,
}

impl Attribute {
    fn new(name: impl Into<String>, kind: AttributeKind, mode: AttributeMode) -> Self {
        Self {
            name: name.into(),
            kind,
            mode,
            graph_name: None,
            default: None,
            immutable: false,
        }
    }

    pub fn required(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::Required)
    }

    pub fn optional(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::Optional)
    }

    pub fn optional_computed(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::OptionalComputed)
    }

    pub fn computed(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self::new(name, kind, AttributeMode::Computed)
    }

    /// Overrides the Graph property name.
    #[must_use]
    pub fn graph_name(mut self, graph_name: impl Into<String>) -> Self {
        self.graph_name = Some(graph_name.into());
        self
    }

    /// Sets a plan-time default. Implies the attribute is computed when unset.
    #[must_use]
    pub fn default_value(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        if self.mode == AttributeMode::Optional {
            self.mode = AttributeMode::OptionalComputed;
        }
        self
    }

    #[must_use]
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// The property name used in Graph payloads.
    pub fn graph_key(&self) -> Cow<'_, str> {
        match &self.graph_name {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(self.name.to_case(Case::Camel)),
        }
    }

    /// Returns the derived-type tag if this attribute is a derived-type node.
    pub fn derived_type(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::DerivedTypeObject { odata_type, .. } => Some(odata_type),
            _ => None,
        }
    }
}

/// An ordered set of attributes, the body of an object kind.
#[derive(Debug, Clone, Default)]
pub struct ObjectSchema {
    attributes: Vec<Attribute>,
}

impl ObjectSchema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Finds the attribute a Graph property maps to: an exact match on a name
    /// override first, then the camelCase form of each local name.
    pub fn find_by_graph_key(&self, key: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| a.graph_name.as_deref() == Some(key))
            .or_else(|| {
                self.attributes
                    .iter()
                    .filter(|a| a.graph_name.is_none() && a.derived_type().is_none())
                    .find(|a| a.graph_key() == key)
            })
    }

    /// Iterates the derived-type child nodes.
    pub fn derived_types(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(|a| a.derived_type().is_some())
    }

    /// Finds the derived-type child node registered for `odata_type`.
    pub fn derived_type_for(&self, odata_type: &str) -> Option<&Attribute> {
        self.derived_types()
            .find(|a| a.derived_type() == Some(odata_type))
    }
}

/// The complete schema of one resource or data source.
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    type_name: String,
    root: ObjectSchema,
    translators: TranslatorTable,
}

impl ResourceSchema {
    pub fn new(type_name: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            type_name: type_name.into(),
            root: ObjectSchema::new(attributes),
            translators: TranslatorTable::default(),
        }
    }

    /// Registers a translator for a dotted schema path such as
    /// `rules.operator`. Collection elements are transparent in the path.
    #[must_use]
    pub fn with_translator(
        mut self,
        schema_path: impl Into<String>,
        translator: Arc<dyn ValueTranslator>,
    ) -> Self {
        self.translators.insert(schema_path, translator);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn root(&self) -> &ObjectSchema {
        &self.root
    }

    pub fn translators(&self) -> &TranslatorTable {
        &self.translators
    }

    pub fn translator(&self, schema_path: &str) -> Option<&Arc<dyn ValueTranslator>> {
        self.translators.get(schema_path)
    }

    /// Resolves a dotted schema path to its attribute.
    pub fn attribute(&self, schema_path: &str) -> ModelResult<&Attribute> {
        let unknown = || ModelError::UnknownPath(schema_path.to_string());
        let mut schema = Some(&self.root);
        let mut found = None;
        for name in schema_path.split('.') {
            let attribute = schema.and_then(|s| s.get(name)).ok_or_else(unknown)?;
            found = Some(attribute);
            schema = attribute.kind.object_schema().or_else(|| {
                attribute
                    .kind
                    .element()
                    .and_then(AttributeKind::object_schema)
            });
        }
        found.ok_or_else(unknown)
    }
}
