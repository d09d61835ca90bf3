use super::{ActionContext, Operation, Stash, StashKey, SubAction, child_uri};
use crate::error::ProviderResult;
use async_trait::async_trait;
use m365_graph::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const EXTRACTED: StashKey<Map<String, Value>> = StashKey::new("all_in_one.extracted");

/// Moves a fixed set of properties out of the primary body and sends them
/// in one follow-up request to a child URI, e.g. the `assign` action of a
/// policy.
#[derive(Debug, Clone)]
pub struct AllInOne {
    keys: Vec<String>,
    uri_suffix: String,
    method: Method,
    key_mapping: HashMap<String, String>,
    empty_before_delete: bool,
    delete_errors_as_warnings: bool,
}

impl AllInOne {
    /// Extracts the Graph properties `keys` and POSTs them to
    /// `{entity}/{uri_suffix}`.
    pub fn new<I, K>(uri_suffix: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            uri_suffix: uri_suffix.into(),
            method: Method::POST,
            key_mapping: HashMap::new(),
            empty_before_delete: false,
            delete_errors_as_warnings: false,
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sends the extracted property `key` as `request_key`.
    #[must_use]
    pub fn rename(mut self, key: impl Into<String>, request_key: impl Into<String>) -> Self {
        self.key_mapping.insert(key.into(), request_key.into());
        self
    }

    /// Sends every key as an empty array right before the entity is
    /// deleted. With `errors_as_warnings`, a failure of that request is
    /// reported as a warning and the delete goes ahead.
    #[must_use]
    pub fn empty_before_delete(mut self, errors_as_warnings: bool) -> Self {
        self.empty_before_delete = true;
        self.delete_errors_as_warnings = errors_as_warnings;
        self
    }

    fn request_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.key_mapping.get(key).map_or(key, String::as_str)
    }

    async fn send(&self, ctx: &ActionContext<'_>, body: Map<String, Value>) -> ProviderResult<()> {
        let uri = child_uri(ctx.entity_uri()?, &self.uri_suffix);
        ctx.client
            .request(self.method.clone(), &uri, Some(&Value::Object(body)), &[200, 201, 204])
            .await?;
        Ok(())
    }

    async fn empty(&self, ctx: &mut ActionContext<'_>) -> ProviderResult<()> {
        let body: Map<String, Value> = self
            .keys
            .iter()
            .map(|key| (self.request_key(key).to_string(), Value::Array(Vec::new())))
            .collect();
        match self.send(ctx, body).await {
            Ok(()) => Ok(()),
            Err(e) if self.delete_errors_as_warnings => {
                warn!(suffix = %self.uri_suffix, error = %e, "emptying before delete failed");
                ctx.diagnostics.add_warning(
                    format!("Could not empty {} before delete", self.uri_suffix),
                    e.detail(),
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SubAction for AllInOne {
    fn name(&self) -> &str {
        "all_in_one"
    }

    fn check_run(&self, operation: Operation) -> bool {
        match operation {
            Operation::Create | Operation::Update => true,
            Operation::Delete => self.empty_before_delete,
        }
    }

    async fn pre(
        &self,
        ctx: &mut ActionContext<'_>,
        body: Option<&mut Map<String, Value>>,
        stash: &mut Stash,
    ) -> ProviderResult<()> {
        if ctx.operation == Operation::Delete {
            return self.empty(ctx).await;
        }
        let Some(body) = body else {
            return Ok(());
        };
        let mut extracted = Map::new();
        for key in &self.keys {
            if let Some(value) = body.remove(key) {
                extracted.insert(self.request_key(key).to_string(), value);
            }
        }
        if !extracted.is_empty() {
            debug!(keys = extracted.len(), suffix = %self.uri_suffix, "withheld properties");
            stash.insert(&EXTRACTED, extracted);
        }
        Ok(())
    }

    async fn post(&self, ctx: &mut ActionContext<'_>, stash: &mut Stash) -> ProviderResult<()> {
        match stash.take(&EXTRACTED) {
            Some(extracted) => self.send(ctx, extracted).await,
            None => Ok(()),
        }
    }
}
