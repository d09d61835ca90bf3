//! The generic Graph-backed resource.
//!
//! Every resource type is an instance of [`GenericResource`] configured by
//! a [`ResourceDefinition`]: schema, URI template, read options, write
//! sub-actions and middleware. Host calls never fail with `Err`; each one
//! returns the new state together with its diagnostics.

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::middleware::{self, Middleware};
use crate::policy::{CriticalSection, Sleeper, TokioSleeper};
use crate::private_state::PrivateState;
use crate::subaction::{ActionContext, Operation, SubAction, SubActions};
use m365_convert::{
    PlanModifier, PlanModifiers, PlanModifyResponse, SingleItem, graph_to_typed, modify_plan, typed_to_graph, unwrap_single,
};
use m365_graph::{EntityUri, ExtraRequest, GraphClient, QueryOptions, crud};
use m365_model::ResourceSchema;
use m365_types::{Diagnostics, TypedValue};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

/// Attribute holding the Graph id of every resource.
pub const ID_ATTRIBUTE: &str = "id";

/// How an entity is read back from Graph.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub query: QueryOptions,
    /// Additional GETs merged into the entity before translation.
    pub extra_requests: Vec<ExtraRequest>,
    /// The entity endpoint answers with a `{"value": [...]}` collection
    /// holding the entity.
    pub collection_shaped: bool,
}

impl ReadOptions {
    /// Extracts the entity object from what `uri` returned.
    pub(crate) fn entity_from(&self, uri: &str, raw: Value) -> ProviderResult<Map<String, Value>> {
        let raw = if self.collection_shaped {
            match unwrap_single(raw) {
                SingleItem::Found(item) => item,
                SingleItem::NotFound => return Err(ProviderError::NotFound(uri.to_string())),
                SingleItem::Multiple(_) => {
                    return Err(ProviderError::UnexpectedResponse(format!(
                        "{uri} returned several entities, expected exactly one"
                    )));
                }
            }
        } else {
            raw
        };
        match raw {
            Value::Object(entity) => Ok(entity),
            _ => Err(ProviderError::UnexpectedResponse(format!("{uri} did not return an object"))),
        }
    }
}

/// Everything that distinguishes one resource type from another.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub schema: ResourceSchema,
    pub uri: EntityUri,
    pub read_options: ReadOptions,
    pub sub_actions: SubActions,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub plan_modifiers: PlanModifiers,
    /// Update with PUT and explicit nulls instead of PATCH.
    pub update_replace: bool,
    /// Serialize all writes of this resource type.
    pub serialize_writes: bool,
    /// Top-level attributes Graph never returns, carried over from plan or
    /// prior state into the new state.
    pub local_attributes: Vec<String>,
}

impl ResourceDefinition {
    pub fn new(schema: ResourceSchema, uri: EntityUri) -> Self {
        Self {
            schema,
            uri,
            read_options: ReadOptions::default(),
            sub_actions: SubActions::new(),
            middleware: Vec::new(),
            plan_modifiers: PlanModifiers::new(),
            update_replace: false,
            serialize_writes: false,
            local_attributes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_read_options(mut self, read_options: ReadOptions) -> Self {
        self.read_options = read_options;
        self
    }

    #[must_use]
    pub fn with_sub_action(mut self, action: Arc<dyn SubAction>) -> Self {
        self.sub_actions.push(action);
        self
    }

    #[must_use]
    pub fn with_middleware(mut self, hook: Arc<dyn Middleware>) -> Self {
        self.middleware.push(hook);
        self
    }

    #[must_use]
    pub fn with_plan_modifier(mut self, schema_path: impl Into<String>, modifier: Arc<dyn PlanModifier>) -> Self {
        self.plan_modifiers.insert(schema_path, modifier);
        self
    }

    #[must_use]
    pub fn update_replace(mut self) -> Self {
        self.update_replace = true;
        self
    }

    #[must_use]
    pub fn serialize_writes(mut self) -> Self {
        self.serialize_writes = true;
        self
    }

    #[must_use]
    pub fn with_local_attribute(mut self, name: impl Into<String>) -> Self {
        self.local_attributes.push(name.into());
        self
    }
}

/// New state and diagnostics of one host call. A null state means the
/// resource is gone (or was never created).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceResponse {
    pub state: TypedValue,
    pub diagnostics: Diagnostics,
}

impl ResourceResponse {
    fn failed(summary: &str, error: &ProviderError, state: TypedValue) -> Self {
        let mut diagnostics = Diagnostics::new();
        error.report(&mut diagnostics, summary);
        Self { state, diagnostics }
    }
}

/// A resource type bound to a Graph client.
#[derive(Debug)]
pub struct GenericResource {
    definition: ResourceDefinition,
    client: GraphClient,
    config: ProviderConfig,
    sleeper: Arc<dyn Sleeper>,
    write_lock: Option<CriticalSection>,
}

impl GenericResource {
    pub fn new(definition: ResourceDefinition, client: GraphClient, config: ProviderConfig) -> Self {
        let write_lock = definition
            .serialize_writes
            .then(|| CriticalSection::new(config.serialize_writes_settle()));
        Self {
            definition,
            client,
            config,
            sleeper: Arc::new(TokioSleeper),
            write_lock,
        }
    }

    /// Replaces the source of delays, e.g. with one that returns at once.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.definition.schema
    }

    /// Applies defaults, registered modifiers and immutability checks to a
    /// proposed plan.
    pub fn modify_plan(&self, config: &TypedValue, state: Option<&TypedValue>, plan: TypedValue) -> PlanModifyResponse {
        modify_plan(&self.definition.schema, config, state, plan, &self.definition.plan_modifiers)
    }

    pub async fn create(&self, plan: &TypedValue, private: &mut dyn PrivateState) -> ResourceResponse {
        let _guard = self.lock_writes().await;
        let mut diagnostics = Diagnostics::new();
        match self.try_create(plan, private, &mut diagnostics).await {
            Ok(state) => ResourceResponse { state, diagnostics },
            Err(e) => {
                e.report(&mut diagnostics, "Create failed");
                ResourceResponse {
                    state: TypedValue::Null,
                    diagnostics,
                }
            }
        }
    }

    /// Refreshes state from Graph. An entity that no longer exists is
    /// dropped from state with a warning.
    pub async fn read(&self, state: &TypedValue) -> ResourceResponse {
        let result = self.entity_location(state);
        let result = match result {
            Ok((parent_ids, id)) => self.read_entity(&parent_ids, &id).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(fresh) => ResourceResponse {
                state: self.carry_over(fresh, state),
                diagnostics: Diagnostics::new(),
            },
            Err(e) if e.is_not_found() => {
                warn!(resource = self.type_name(), "entity not found, removing from state");
                let mut diagnostics = Diagnostics::new();
                diagnostics.add_warning(
                    format!("{} not found", self.type_name()),
                    "The entity no longer exists in Microsoft Graph and was removed from state.",
                );
                ResourceResponse {
                    state: TypedValue::Null,
                    diagnostics,
                }
            }
            Err(e) => ResourceResponse::failed("Read failed", &e, state.clone()),
        }
    }

    pub async fn update(
        &self,
        plan: &TypedValue,
        state: &TypedValue,
        private: &mut dyn PrivateState,
    ) -> ResourceResponse {
        let _guard = self.lock_writes().await;
        let mut diagnostics = Diagnostics::new();
        match self.try_update(plan, state, private, &mut diagnostics).await {
            Ok(new_state) => ResourceResponse {
                state: new_state,
                diagnostics,
            },
            Err(e) => {
                e.report(&mut diagnostics, "Update failed");
                ResourceResponse {
                    state: state.clone(),
                    diagnostics,
                }
            }
        }
    }

    pub async fn delete(&self, state: &TypedValue, private: &mut dyn PrivateState) -> Diagnostics {
        let _guard = self.lock_writes().await;
        let mut diagnostics = Diagnostics::new();
        if let Err(e) = self.try_delete(state, private, &mut diagnostics).await {
            e.report(&mut diagnostics, "Delete failed");
        }
        diagnostics
    }

    /// Reads an existing entity into state. Nested resources take
    /// `{parent id}/.../{id}`.
    pub async fn import(&self, import_id: &str) -> ResourceResponse {
        let result = self.import_state(import_id).await;
        match result {
            Ok(state) => ResourceResponse {
                state,
                diagnostics: Diagnostics::new(),
            },
            Err(e) => ResourceResponse::failed("Import failed", &e, TypedValue::Null),
        }
    }

    fn type_name(&self) -> &str {
        self.definition.schema.type_name()
    }

    async fn lock_writes(&self) -> Option<MutexGuard<'_, ()>> {
        match &self.write_lock {
            Some(lock) => Some(lock.enter(self.sleeper.as_ref()).await),
            None => None,
        }
    }

    fn context<'a>(
        &'a self,
        operation: Operation,
        plan: Option<&'a TypedValue>,
        state: Option<&'a TypedValue>,
        entity_uri: Option<String>,
        private: &'a mut dyn PrivateState,
    ) -> ActionContext<'a> {
        ActionContext {
            operation,
            client: &self.client,
            schema: &self.definition.schema,
            config: &self.config,
            sleeper: self.sleeper.as_ref(),
            plan,
            state,
            entity_uri,
            private,
            diagnostics: Diagnostics::new(),
        }
    }

    fn parent_ids(&self, tree: &TypedValue) -> ProviderResult<Vec<String>> {
        self.definition
            .uri
            .parents()
            .iter()
            .map(|parent| {
                tree.attr_str(&parent.id_attribute)
                    .map(str::to_string)
                    .ok_or_else(|| ProviderError::MissingAttribute(parent.id_attribute.clone()))
            })
            .collect()
    }

    fn entity_location(&self, tree: &TypedValue) -> ProviderResult<(Vec<String>, String)> {
        let parent_ids = self.parent_ids(tree)?;
        let id = tree
            .attr_str(ID_ATTRIBUTE)
            .ok_or_else(|| ProviderError::MissingAttribute(ID_ATTRIBUTE.to_string()))?;
        Ok((parent_ids, id.to_string()))
    }

    fn request_body(&self, operation: Operation, plan: &TypedValue, include_null: bool) -> ProviderResult<Map<String, Value>> {
        let mut body = typed_to_graph(&self.definition.schema, plan, include_null)?;
        body.remove(ID_ATTRIBUTE);
        // Parent ids live in the URI and local attributes never reach Graph.
        let unsent = self
            .definition
            .uri
            .parents()
            .iter()
            .map(|p| &p.id_attribute)
            .chain(&self.definition.local_attributes);
        for name in unsent {
            let attribute = self.definition.schema.attribute(name)?;
            body.remove(attribute.graph_key().as_ref());
        }
        middleware::to_graph(&self.definition.middleware, operation, &mut body)?;
        Ok(body)
    }

    async fn read_entity(&self, parent_ids: &[String], id: &str) -> ProviderResult<TypedValue> {
        let uri = self.definition.uri.entity(parent_ids, id)?;
        let options = &self.definition.read_options;
        let raw = crud::read(&self.client, &uri, &options.query, &options.extra_requests).await?;
        let mut raw = options.entity_from(&uri, raw)?;
        middleware::to_terraform(&self.definition.middleware, &mut raw)?;
        Ok(graph_to_typed(&self.definition.schema, &raw)?)
    }

    /// Copies parent ids and local attributes, which Graph does not echo,
    /// from `source` into `fresh`. Unknowns inside them become null.
    fn carry_over(&self, mut fresh: TypedValue, source: &TypedValue) -> TypedValue {
        let Some(attrs) = fresh.as_object_mut() else {
            return fresh;
        };
        let names = self
            .definition
            .uri
            .parents()
            .iter()
            .map(|p| &p.id_attribute)
            .chain(&self.definition.local_attributes);
        for name in names {
            if let Some(value) = source.get_attr(name).filter(|v| !v.is_null_or_unknown()) {
                attrs.insert(name.clone(), resolve_unknowns(value.clone()));
            }
        }
        fresh
    }

    async fn try_create(
        &self,
        plan: &TypedValue,
        private: &mut dyn PrivateState,
        diagnostics: &mut Diagnostics,
    ) -> ProviderResult<TypedValue> {
        let parent_ids = self.parent_ids(plan)?;
        let mut body = self.request_body(Operation::Create, plan, false)?;

        let mut ctx = self.context(Operation::Create, Some(plan), None, None, private);
        let mut stashes = self.definition.sub_actions.run_pre(&mut ctx, Some(&mut body)).await?;

        let collection = self.definition.uri.collection(&parent_ids)?;
        let created = crud::create(&self.client, &collection, &Value::Object(body)).await?;
        let id = created
            .get(ID_ATTRIBUTE)
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::UnexpectedResponse(format!("{collection} returned no id")))?
            .to_string();
        info!(resource = self.type_name(), id = %id, "created");

        ctx.entity_uri = Some(self.definition.uri.entity(&parent_ids, &id)?);
        let post = self.definition.sub_actions.run_post(&mut ctx, &mut stashes).await;
        diagnostics.extend(std::mem::take(&mut ctx.diagnostics));
        if let Err(e) = post {
            e.report(diagnostics, "Create follow-up request failed");
        }

        // The entity exists from here on; keep it in state whatever happens.
        match self.read_entity(&parent_ids, &id).await {
            Ok(fresh) => Ok(self.carry_over(fresh, plan)),
            Err(e) => {
                e.report(diagnostics, "Reading the created entity failed");
                let mut fallback = resolve_unknowns(plan.clone());
                if let Some(attrs) = fallback.as_object_mut() {
                    attrs.insert(ID_ATTRIBUTE.to_string(), TypedValue::String(id));
                }
                Ok(fallback)
            }
        }
    }

    async fn try_update(
        &self,
        plan: &TypedValue,
        state: &TypedValue,
        private: &mut dyn PrivateState,
        diagnostics: &mut Diagnostics,
    ) -> ProviderResult<TypedValue> {
        let (parent_ids, id) = self.entity_location(state)?;
        let entity_uri = self.definition.uri.entity(&parent_ids, &id)?;
        let replace = self.definition.update_replace;
        let mut body = self.request_body(Operation::Update, plan, replace)?;

        let mut ctx = self.context(Operation::Update, Some(plan), Some(state), Some(entity_uri.clone()), private);
        let mut stashes = self.definition.sub_actions.run_pre(&mut ctx, Some(&mut body)).await?;

        crud::update(&self.client, &entity_uri, &Value::Object(body), replace).await?;
        debug!(resource = self.type_name(), id = %id, replace, "updated");

        let post = self.definition.sub_actions.run_post(&mut ctx, &mut stashes).await;
        diagnostics.extend(std::mem::take(&mut ctx.diagnostics));
        if let Err(e) = post {
            e.report(diagnostics, "Update follow-up request failed");
        }

        let fresh = self.read_entity(&parent_ids, &id).await?;
        Ok(self.carry_over(fresh, plan))
    }

    async fn try_delete(
        &self,
        state: &TypedValue,
        private: &mut dyn PrivateState,
        diagnostics: &mut Diagnostics,
    ) -> ProviderResult<()> {
        let (parent_ids, id) = self.entity_location(state)?;
        let entity_uri = self.definition.uri.entity(&parent_ids, &id)?;

        let mut ctx = self.context(Operation::Delete, None, Some(state), Some(entity_uri.clone()), private);
        let pre = self.definition.sub_actions.run_pre(&mut ctx, None).await;
        diagnostics.extend(std::mem::take(&mut ctx.diagnostics));
        let mut stashes = pre?;

        match crud::delete(&self.client, &entity_uri).await {
            Ok(()) => info!(resource = self.type_name(), id = %id, "deleted"),
            Err(e) if e.is_not_found() => debug!(resource = self.type_name(), id = %id, "already deleted"),
            Err(e) => return Err(e.into()),
        }

        let post = self.definition.sub_actions.run_post(&mut ctx, &mut stashes).await;
        diagnostics.extend(std::mem::take(&mut ctx.diagnostics));
        post
    }

    async fn import_state(&self, import_id: &str) -> ProviderResult<TypedValue> {
        let parents = self.definition.uri.parents();
        let parts: Vec<&str> = import_id.split('/').collect();
        if parts.len() != parents.len() + 1 || parts.iter().any(|p| p.is_empty()) {
            let expected = parents
                .iter()
                .map(|p| p.id_attribute.as_str())
                .chain([ID_ATTRIBUTE])
                .collect::<Vec<_>>()
                .join("/");
            return Err(ProviderError::Config(format!(
                "import id {import_id:?} does not match {expected}"
            )));
        }

        let (id, parent_ids) = parts.split_last().map(|(id, rest)| (*id, rest)).unwrap_or_default();
        let parent_ids: Vec<String> = parent_ids.iter().map(|p| p.to_string()).collect();
        let fresh = self.read_entity(&parent_ids, id).await?;

        let source = TypedValue::object(
            parents
                .iter()
                .zip(&parent_ids)
                .map(|(parent, value)| (parent.id_attribute.clone(), TypedValue::string(value.clone()))),
        );
        Ok(self.carry_over(fresh, &source))
    }
}

/// Replaces every unknown in `value` with null.
fn resolve_unknowns(value: TypedValue) -> TypedValue {
    match value {
        TypedValue::Unknown => TypedValue::Null,
        TypedValue::List(items) => TypedValue::List(items.into_iter().map(resolve_unknowns).collect()),
        TypedValue::Set(items) => TypedValue::Set(items.into_iter().map(resolve_unknowns).collect()),
        TypedValue::Object(attrs) => {
            TypedValue::Object(attrs.into_iter().map(|(k, v)| (k, resolve_unknowns(v))).collect())
        }
        TypedValue::Map(entries) => {
            TypedValue::Map(entries.into_iter().map(|(k, v)| (k, resolve_unknowns(v))).collect())
        }
        other => other,
    }
}
