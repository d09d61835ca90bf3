//! Read-only data sources over Graph collections.

use crate::error::{ProviderError, ProviderResult};
use crate::middleware::{self, Middleware};
use crate::resource::{ID_ATTRIBUTE, ReadOptions, ResourceResponse};
use m365_convert::{SingleItem, graph_to_typed, object_to_typed, unwrap_single};
use m365_graph::{EntityUri, GraphClient, QueryOptions, crud, odata_string};
use m365_model::ResourceSchema;
use m365_types::{AttrPath, Diagnostics, TypedValue};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Attribute of a plural data source holding the OData `$filter`.
pub const FILTER_ATTRIBUTE: &str = "filter";

fn parent_ids(uri: &EntityUri, config: &TypedValue) -> ProviderResult<Vec<String>> {
    uri.parents()
        .iter()
        .map(|parent| {
            config
                .attr_str(&parent.id_attribute)
                .map(str::to_string)
                .ok_or_else(|| ProviderError::MissingAttribute(parent.id_attribute.clone()))
        })
        .collect()
}

fn copy_attributes<'a>(mut target: TypedValue, source: &TypedValue, names: impl IntoIterator<Item = &'a String>) -> TypedValue {
    if let Some(attrs) = target.as_object_mut() {
        for name in names {
            if let Some(value) = source.get_attr(name).filter(|v| !v.is_null_or_unknown()) {
                attrs.insert(name.clone(), value.clone());
            }
        }
    }
    target
}

/// Renders a configured value as an OData literal.
fn odata_literal(value: &TypedValue) -> Option<String> {
    match value {
        TypedValue::String(s) => Some(odata_string(s)),
        TypedValue::Bool(b) => Some(b.to_string()),
        TypedValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Looks up exactly one entity, either by `id` or by an equality filter over
/// the configured lookup attributes.
#[derive(Debug, Clone)]
pub struct SingularDataSource {
    schema: ResourceSchema,
    uri: EntityUri,
    read_options: ReadOptions,
    lookup_attributes: Vec<String>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl SingularDataSource {
    pub fn new(schema: ResourceSchema, uri: EntityUri) -> Self {
        Self {
            schema,
            uri,
            read_options: ReadOptions::default(),
            lookup_attributes: Vec::new(),
            middleware: Vec::new(),
        }
    }

    /// Allows lookup by `name` when no id is configured.
    #[must_use]
    pub fn lookup_by(mut self, name: impl Into<String>) -> Self {
        self.lookup_attributes.push(name.into());
        self
    }

    #[must_use]
    pub fn with_read_options(mut self, read_options: ReadOptions) -> Self {
        self.read_options = read_options;
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, hook: Arc<dyn Middleware>) -> Self {
        self.middleware.push(hook);
        self
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    /// The `$filter` matching every configured lookup attribute, or `None`
    /// when none is set.
    pub fn lookup_filter(&self, config: &TypedValue) -> ProviderResult<Option<String>> {
        let mut clauses = Vec::new();
        for name in &self.lookup_attributes {
            let Some(value) = config.get_attr(name).filter(|v| !v.is_null_or_unknown()) else {
                continue;
            };
            let attribute = self.schema.attribute(name)?;
            let literal = odata_literal(value)
                .ok_or_else(|| ProviderError::Config(format!("{name} cannot be used in a filter")))?;
            clauses.push(format!("{} eq {literal}", attribute.graph_key()));
        }
        Ok((!clauses.is_empty()).then(|| clauses.join(" and ")))
    }

    pub async fn read(&self, client: &GraphClient, config: &TypedValue) -> ResourceResponse {
        match self.try_read(client, config).await {
            Ok(state) => ResourceResponse {
                state,
                diagnostics: Diagnostics::new(),
            },
            Err(e) => {
                let mut diagnostics = Diagnostics::new();
                e.report(&mut diagnostics, format!("Reading {} failed", self.schema.type_name()));
                ResourceResponse {
                    state: TypedValue::Null,
                    diagnostics,
                }
            }
        }
    }

    async fn try_read(&self, client: &GraphClient, config: &TypedValue) -> ProviderResult<TypedValue> {
        let parent_ids = parent_ids(&self.uri, config)?;
        let id = match config.attr_str(ID_ATTRIBUTE) {
            Some(id) => id.to_string(),
            None => self.find_id(client, &parent_ids, config).await?,
        };

        let uri = self.uri.entity(&parent_ids, &id)?;
        let options = &self.read_options;
        let raw = crud::read(client, &uri, &options.query, &options.extra_requests).await?;
        let mut raw = options.entity_from(&uri, raw)?;
        middleware::to_terraform(&self.middleware, &mut raw)?;
        let state = graph_to_typed(&self.schema, &raw)?;

        let parents = self.uri.parents().iter().map(|p| &p.id_attribute);
        Ok(copy_attributes(state, config, parents))
    }

    async fn find_id(&self, client: &GraphClient, parent_ids: &[String], config: &TypedValue) -> ProviderResult<String> {
        let filter = self.lookup_filter(config)?.ok_or_else(|| {
            let mut names = vec![ID_ATTRIBUTE.to_string()];
            names.extend(self.lookup_attributes.iter().cloned());
            ProviderError::Config(format!("one of {} must be set", names.join(", ")))
        })?;
        debug!(data_source = self.schema.type_name(), %filter, "looking up by filter");

        let collection = self.uri.collection(parent_ids)?;
        let query = QueryOptions {
            filter: Some(filter.clone()),
            select: vec![ID_ATTRIBUTE.to_string()],
            expand: None,
        };
        let matches = crud::list(client, &collection, &query).await?;
        let count = matches.len();
        let mut page = Map::new();
        page.insert("value".to_string(), Value::Array(matches));
        match unwrap_single(Value::Object(page)) {
            SingleItem::NotFound => Err(ProviderError::NotFound(format!(
                "no {} matches {filter}",
                self.schema.type_name()
            ))),
            SingleItem::Found(item) => item
                .get(ID_ATTRIBUTE)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ProviderError::UnexpectedResponse(format!("{collection} returned an item without id"))),
            SingleItem::Multiple(_) => Err(ProviderError::UnexpectedResponse(format!(
                "{count} {} entities match {filter}, expected exactly one",
                self.schema.type_name()
            ))),
        }
    }
}

/// Lists a collection, optionally filtered, into a list attribute.
#[derive(Debug, Clone)]
pub struct PluralDataSource {
    schema: ResourceSchema,
    uri: EntityUri,
    result_attribute: String,
    query: QueryOptions,
}

impl PluralDataSource {
    /// `result_attribute` must be a list of objects in `schema`.
    pub fn new(schema: ResourceSchema, uri: EntityUri, result_attribute: impl Into<String>) -> Self {
        Self {
            schema,
            uri,
            result_attribute: result_attribute.into(),
            query: QueryOptions::default(),
        }
    }

    /// `$select`/`$expand` sent with every list request.
    #[must_use]
    pub fn with_query(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub async fn read(&self, client: &GraphClient, config: &TypedValue) -> ResourceResponse {
        match self.try_read(client, config).await {
            Ok(state) => ResourceResponse {
                state,
                diagnostics: Diagnostics::new(),
            },
            Err(e) => {
                let mut diagnostics = Diagnostics::new();
                e.report(&mut diagnostics, format!("Listing {} failed", self.schema.type_name()));
                ResourceResponse {
                    state: TypedValue::Null,
                    diagnostics,
                }
            }
        }
    }

    async fn try_read(&self, client: &GraphClient, config: &TypedValue) -> ProviderResult<TypedValue> {
        let parent_ids = parent_ids(&self.uri, config)?;
        let element_schema = self
            .schema
            .attribute(&self.result_attribute)?
            .kind
            .element()
            .and_then(|e| e.object_schema())
            .ok_or_else(|| ProviderError::Config(format!("{} is not a list of objects", self.result_attribute)))?;

        let mut query = self.query.clone();
        query.filter = config.attr_str(FILTER_ATTRIBUTE).map(str::to_string);
        let collection = self.uri.collection(&parent_ids)?;
        let items = crud::list(client, &collection, &query).await?;
        debug!(data_source = self.schema.type_name(), count = items.len(), "listed");

        let list_path = AttrPath::attr(self.result_attribute.clone());
        let empty = Map::new();
        let elements = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let raw = item.as_object().unwrap_or(&empty);
                object_to_typed(&self.schema, element_schema, &list_path.join_index(i), raw)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut attrs = std::collections::BTreeMap::new();
        for attribute in self.schema.root().attributes() {
            let value = config.get_attr(&attribute.name).cloned().unwrap_or(TypedValue::Null);
            attrs.insert(attribute.name.clone(), if value.is_unknown() { TypedValue::Null } else { value });
        }
        attrs.insert(self.result_attribute.clone(), TypedValue::List(elements));
        Ok(TypedValue::Object(attrs))
    }
}
