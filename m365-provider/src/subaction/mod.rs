//! Write sub-actions.
//!
//! Many Graph entities need several dependent requests to represent one
//! resource apply. A resource registers [`SubAction`]s that run around its
//! primary create, update or delete request:
//!
//! ```text
//! pre(action 1) .. pre(action n) -> primary request -> post(action 1) .. post(action n)
//! ```
//!
//! A failing pre aborts before the primary request is sent. A failing post
//! is reported but the primary request stays applied; the next refresh
//! reconciles any drift.
//!
//! Pre and post of one action share a private [`Stash`] addressed through
//! typed [`StashKey`]s, so two actions can never read each other's data.

mod all_in_one;
mod individual;
mod post_and_patch;

pub use all_in_one::AllInOne;
pub use individual::{ElementDiff, ElementKey, Individual, ReferenceTarget, diff_elements};
pub use post_and_patch::PostAndPatch;

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::policy::Sleeper;
use crate::private_state::PrivateState;
use async_trait::async_trait;
use m365_graph::GraphClient;
use m365_model::ResourceSchema;
use m365_types::{Diagnostics, TypedValue};
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// The write being carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        })
    }
}

/// Typed address of a stash entry.
pub struct StashKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StashKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for StashKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StashKey<T> {}

impl<T> fmt::Debug for StashKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StashKey").field(&self.name).finish()
    }
}

/// Data a sub-action carries from its pre phase to its post phase.
#[derive(Default)]
pub struct Stash {
    entries: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl Stash {
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &StashKey<T>, value: T) {
        self.entries.insert(key.name, Box::new(value));
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &StashKey<T>) -> Option<&T> {
        self.entries.get(key.name)?.downcast_ref()
    }

    /// Removes and returns an entry.
    pub fn take<T: Any + Send + Sync>(&mut self, key: &StashKey<T>) -> Option<T> {
        let boxed = self.entries.remove(key.name)?;
        boxed.downcast::<T>().ok().map(|value| *value)
    }

    pub fn contains<T: Any + Send + Sync>(&self, key: &StashKey<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Stash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// Everything a sub-action may consult or touch during one write.
pub struct ActionContext<'a> {
    pub operation: Operation,
    pub client: &'a GraphClient,
    pub schema: &'a ResourceSchema,
    pub config: &'a ProviderConfig,
    pub sleeper: &'a dyn Sleeper,
    /// Planned state; absent on delete.
    pub plan: Option<&'a TypedValue>,
    /// Prior state; absent on create.
    pub state: Option<&'a TypedValue>,
    /// URI of the entity, known once it exists (i.e. not during pre on
    /// create).
    pub entity_uri: Option<String>,
    pub private: &'a mut dyn PrivateState,
    /// Warnings to hand back to the host.
    pub diagnostics: Diagnostics,
}

impl ActionContext<'_> {
    pub fn entity_uri(&self) -> ProviderResult<&str> {
        self.entity_uri
            .as_deref()
            .ok_or_else(|| ProviderError::MissingAttribute("id".to_string()))
    }
}

impl fmt::Debug for ActionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("operation", &self.operation)
            .field("entity_uri", &self.entity_uri)
            .finish_non_exhaustive()
    }
}

/// One step of a decomposed write.
#[async_trait]
pub trait SubAction: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether the action takes part in `operation`. By default it runs on
    /// create and update only.
    fn check_run(&self, operation: Operation) -> bool {
        matches!(operation, Operation::Create | Operation::Update)
    }

    /// Runs before the primary request. `body` is the request body being
    /// built; it is absent on delete.
    async fn pre(
        &self,
        _ctx: &mut ActionContext<'_>,
        _body: Option<&mut Map<String, Value>>,
        _stash: &mut Stash,
    ) -> ProviderResult<()> {
        Ok(())
    }

    /// Runs after the primary request succeeded.
    async fn post(&self, _ctx: &mut ActionContext<'_>, _stash: &mut Stash) -> ProviderResult<()> {
        Ok(())
    }
}

/// The ordered sub-actions of one resource type.
#[derive(Debug, Clone, Default)]
pub struct SubActions {
    actions: Vec<Arc<dyn SubAction>>,
}

impl SubActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Arc<dyn SubAction>) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Runs every participating pre phase in registration order and
    /// returns one stash per registered action.
    pub async fn run_pre(
        &self,
        ctx: &mut ActionContext<'_>,
        mut body: Option<&mut Map<String, Value>>,
    ) -> ProviderResult<Vec<Stash>> {
        let mut stashes = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            let mut stash = Stash::default();
            if action.check_run(ctx.operation) {
                debug!(action = action.name(), operation = %ctx.operation, "sub-action pre");
                action.pre(ctx, body.as_deref_mut(), &mut stash).await?;
            }
            stashes.push(stash);
        }
        Ok(stashes)
    }

    /// Runs every participating post phase in registration order, stopping
    /// at the first failure.
    pub async fn run_post(&self, ctx: &mut ActionContext<'_>, stashes: &mut [Stash]) -> ProviderResult<()> {
        for (action, stash) in self.actions.iter().zip(stashes.iter_mut()) {
            if action.check_run(ctx.operation) {
                debug!(action = action.name(), operation = %ctx.operation, "sub-action post");
                action.post(ctx, stash).await?;
            }
        }
        Ok(())
    }
}

impl FromIterator<Arc<dyn SubAction>> for SubActions {
    fn from_iter<I: IntoIterator<Item = Arc<dyn SubAction>>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

/// Joins an entity URI and a child segment.
pub(crate) fn child_uri(entity_uri: &str, suffix: &str) -> String {
    format!("{}/{}", entity_uri.trim_end_matches('/'), suffix.trim_matches('/'))
}
