use super::{ActionContext, Stash, SubAction, child_uri};
use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use m365_convert::object_to_graph;
use m365_model::{AttributeKind, ObjectSchema, ResourceSchema};
use m365_types::{AttrPath, TypedValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type KeyFn = dyn Fn(&TypedValue) -> Option<String> + Send + Sync;

/// Derives the comparison key of a collection element.
#[derive(Clone)]
pub enum ElementKey {
    /// A top-level string attribute of the element.
    Attribute(String),
    /// A caller-supplied extraction, e.g. the id of a referenced entity
    /// nested inside the element.
    Custom(Arc<KeyFn>),
}

impl ElementKey {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::Attribute(name.into())
    }

    pub fn custom<F>(extract: F) -> Self
    where
        F: Fn(&TypedValue) -> Option<String> + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(extract))
    }

    /// Returns the key, or `None` when the element cannot be tracked.
    pub fn extract(&self, element: &TypedValue) -> Option<String> {
        match self {
            Self::Attribute(name) => element.attr_str(name).map(str::to_string),
            Self::Custom(extract) => extract(element),
        }
    }
}

impl fmt::Debug for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Partition of a planned collection against its prior state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementDiff {
    /// Planned elements whose key is not in state.
    pub add: Vec<(String, TypedValue)>,
    /// Keys present in both with differing elements, as (key, planned, prior).
    pub update: Vec<(String, TypedValue, TypedValue)>,
    /// Prior elements whose key is no longer planned.
    pub delete: Vec<(String, TypedValue)>,
}

impl ElementDiff {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Rewrites every update as a delete of the prior element plus an add
    /// of the planned one. Returns the keys that were rewritten.
    pub fn into_replacements(mut self) -> (Self, Vec<String>) {
        let mut replaced = Vec::with_capacity(self.update.len());
        for (key, planned, prior) in std::mem::take(&mut self.update) {
            self.delete.push((key.clone(), prior));
            self.add.push((key.clone(), planned));
            replaced.push(key);
        }
        (self, replaced)
    }
}

/// Diffs two element lists by key. Elements without a key are ignored; of
/// several elements sharing a key the last one counts.
pub fn diff_elements(plan: &[TypedValue], state: &[TypedValue], key: &ElementKey) -> ElementDiff {
    let planned = by_key(plan, key);
    let prior = by_key(state, key);
    let mut diff = ElementDiff::default();

    for (k, element) in &planned {
        match prior.get(k) {
            None => diff.add.push((k.clone(), (*element).clone())),
            Some(old) if *old != *element => {
                diff.update.push((k.clone(), (*element).clone(), (*old).clone()));
            }
            Some(_) => {}
        }
    }
    for (k, old) in prior {
        if !planned.contains_key(&k) {
            diff.delete.push((k, old.clone()));
        }
    }
    diff
}

fn by_key<'a>(elements: &'a [TypedValue], key: &ElementKey) -> BTreeMap<String, &'a TypedValue> {
    elements
        .iter()
        .filter_map(|element| key.extract(element).map(|k| (k, element)))
        .collect()
}

/// Where OData references point, chosen by the element's derived type.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTarget {
    prefixes: Vec<(String, String)>,
    default_prefix: Option<String>,
}

impl ReferenceTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Elements whose active derived type is `odata_type` reference
    /// `{prefix}{key}`.
    #[must_use]
    pub fn with_prefix(mut self, odata_type: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.prefixes.push((odata_type.into(), prefix.into()));
        self
    }

    /// Prefix for elements no derived type matched.
    #[must_use]
    pub fn with_default(mut self, prefix: impl Into<String>) -> Self {
        self.default_prefix = Some(prefix.into());
        self
    }

    fn prefix_for(&self, odata_type: Option<&str>) -> ProviderResult<&str> {
        odata_type
            .and_then(|tag| self.prefixes.iter().find(|(t, _)| t == tag))
            .map(|(_, prefix)| prefix.as_str())
            .or(self.default_prefix.as_deref())
            .ok_or_else(|| {
                ProviderError::Config(format!(
                    "no reference prefix for derived type {}",
                    odata_type.unwrap_or("(none)")
                ))
            })
    }
}

/// Reconciles a child collection element by element after the parent
/// write.
///
/// Nested children are POSTed, PATCHed and DELETEd individually, in that
/// order. OData reference children cannot be updated in place: a changed
/// reference is removed and re-added, and removals run first.
#[derive(Debug, Clone)]
pub struct Individual {
    attribute: String,
    uri_suffix: String,
    key: ElementKey,
    reference: Option<ReferenceTarget>,
}

impl Individual {
    /// Children living at `{entity}/{uri_suffix}/{key}`.
    pub fn nested(attribute: impl Into<String>, uri_suffix: impl Into<String>, key: ElementKey) -> Self {
        Self {
            attribute: attribute.into(),
            uri_suffix: uri_suffix.into(),
            key,
            reference: None,
        }
    }

    /// References managed through `{entity}/{uri_suffix}/$ref`.
    pub fn references(
        attribute: impl Into<String>,
        uri_suffix: impl Into<String>,
        key: ElementKey,
        target: ReferenceTarget,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            uri_suffix: uri_suffix.into(),
            key,
            reference: Some(target),
        }
    }

    fn elements<'a>(&self, tree: Option<&'a TypedValue>) -> &'a [TypedValue] {
        tree.and_then(|t| t.get_attr(&self.attribute))
            .and_then(TypedValue::elements)
            .unwrap_or_default()
    }

    fn element_schema<'a>(&self, schema: &'a ResourceSchema) -> ProviderResult<&'a ObjectSchema> {
        schema
            .attribute(&self.attribute)?
            .kind
            .element()
            .and_then(AttributeKind::object_schema)
            .ok_or_else(|| {
                ProviderError::Config(format!("{} is not a collection of objects", self.attribute))
            })
    }

    fn body(&self, ctx: &ActionContext<'_>, element: &TypedValue) -> ProviderResult<Value> {
        let schema = self.element_schema(ctx.schema)?;
        let body = object_to_graph(ctx.schema, schema, &AttrPath::attr(self.attribute.clone()), element, false)?;
        Ok(Value::Object(body))
    }

    async fn apply_nested(&self, ctx: &ActionContext<'_>, diff: ElementDiff) -> ProviderResult<()> {
        let collection = child_uri(ctx.entity_uri()?, &self.uri_suffix);
        for (key, element) in &diff.add {
            debug!(attribute = %self.attribute, key = %key, "adding element");
            ctx.client.post(&collection, &self.body(ctx, element)?, &[200, 201, 204]).await?;
        }
        for (key, planned, _) in &diff.update {
            debug!(attribute = %self.attribute, key = %key, "updating element");
            let uri = child_uri(&collection, &urlencoding::encode(key));
            ctx.client.patch(&uri, &self.body(ctx, planned)?, &[200, 204]).await?;
        }
        for (key, _) in &diff.delete {
            debug!(attribute = %self.attribute, key = %key, "deleting element");
            let uri = child_uri(&collection, &urlencoding::encode(key));
            ctx.client.delete(&uri, &[200, 204]).await?;
        }
        Ok(())
    }

    async fn apply_references(
        &self,
        ctx: &mut ActionContext<'_>,
        target: &ReferenceTarget,
        diff: ElementDiff,
    ) -> ProviderResult<()> {
        let (diff, replaced) = diff.into_replacements();
        for key in &replaced {
            ctx.diagnostics.add_warning(
                format!("Reference in {} changed", self.attribute),
                format!("{key} cannot be updated in place; it is removed and added again"),
            );
        }

        let collection = child_uri(ctx.entity_uri()?, &self.uri_suffix);
        let schema = self.element_schema(ctx.schema)?;
        let mut additions = Vec::with_capacity(diff.add.len());
        for (key, element) in &diff.add {
            let odata_type = active_derived_type(schema, element);
            let prefix = target.prefix_for(odata_type)?;
            additions.push((key, format!("{prefix}{key}")));
        }

        for (key, _) in &diff.delete {
            debug!(attribute = %self.attribute, key = %key, "removing reference");
            let uri = child_uri(&child_uri(&collection, &urlencoding::encode(key)), "$ref");
            ctx.client.delete(&uri, &[200, 204]).await?;
        }
        let add_uri = child_uri(&collection, "$ref");
        for (key, odata_id) in additions {
            debug!(attribute = %self.attribute, key = %key, "adding reference");
            let mut body = Map::new();
            body.insert("@odata.id".to_string(), Value::String(odata_id));
            ctx.client.post(&add_uri, &Value::Object(body), &[200, 201, 204]).await?;
        }
        Ok(())
    }
}

/// The derived-type tag of whichever derived node of `element` is set.
fn active_derived_type<'a>(schema: &'a ObjectSchema, element: &TypedValue) -> Option<&'a str> {
    schema
        .derived_types()
        .find(|node| {
            element
                .get_attr(&node.name)
                .is_some_and(|value| !value.is_null_or_unknown())
        })
        .and_then(|node| node.derived_type())
}

#[async_trait]
impl SubAction for Individual {
    fn name(&self) -> &str {
        "individual"
    }

    async fn pre(
        &self,
        ctx: &mut ActionContext<'_>,
        body: Option<&mut Map<String, Value>>,
        _stash: &mut Stash,
    ) -> ProviderResult<()> {
        if let Some(body) = body {
            let graph_key = ctx.schema.attribute(&self.attribute)?.graph_key();
            body.remove(graph_key.as_ref());
        }
        Ok(())
    }

    async fn post(&self, ctx: &mut ActionContext<'_>, _stash: &mut Stash) -> ProviderResult<()> {
        if ctx
            .plan
            .and_then(|p| p.get_attr(&self.attribute))
            .is_some_and(TypedValue::is_unknown)
        {
            return Ok(());
        }
        let diff = diff_elements(self.elements(ctx.plan), self.elements(ctx.state), &self.key);
        if diff.is_empty() {
            return Ok(());
        }
        debug!(
            attribute = %self.attribute,
            add = diff.add.len(),
            update = diff.update.len(),
            delete = diff.delete.len(),
            "reconciling collection"
        );
        match &self.reference {
            Some(target) => self.apply_references(ctx, target, diff).await,
            None => self.apply_nested(ctx, diff).await,
        }
    }
}
