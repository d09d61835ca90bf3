use super::{ActionContext, Operation, Stash, StashKey, SubAction};
use crate::error::ProviderResult;
use async_trait::async_trait;
use m365_model::ODATA_TYPE;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

const WITHHELD: StashKey<Map<String, Value>> = StashKey::new("post_and_patch.withheld");

/// Creates the entity with part of the body and PATCHes the rest once it
/// exists, for entity types that reject some properties on POST.
///
/// With an include list only those properties are withheld; otherwise
/// everything not on the exclude list is. `@odata.type` is always sent on
/// both requests.
#[derive(Debug, Clone, Default)]
pub struct PostAndPatch {
    include: HashSet<String>,
    exclude: HashSet<String>,
}

impl PostAndPatch {
    /// Withholds exactly the given Graph properties.
    pub fn including<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            include: keys.into_iter().map(Into::into).collect(),
            exclude: HashSet::new(),
        }
    }

    /// Withholds every Graph property except the given ones.
    pub fn excluding<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            include: HashSet::new(),
            exclude: keys.into_iter().map(Into::into).collect(),
        }
    }

    fn withholds(&self, key: &str) -> bool {
        if key == ODATA_TYPE {
            return false;
        }
        if self.include.is_empty() {
            !self.exclude.contains(key)
        } else {
            self.include.contains(key)
        }
    }
}

#[async_trait]
impl SubAction for PostAndPatch {
    fn name(&self) -> &str {
        "post_and_patch"
    }

    fn check_run(&self, operation: Operation) -> bool {
        operation == Operation::Create
    }

    async fn pre(
        &self,
        _ctx: &mut ActionContext<'_>,
        body: Option<&mut Map<String, Value>>,
        stash: &mut Stash,
    ) -> ProviderResult<()> {
        let Some(body) = body else {
            return Ok(());
        };
        let keys: Vec<String> = body.keys().filter(|k| self.withholds(k)).cloned().collect();
        if keys.is_empty() {
            return Ok(());
        }
        let mut withheld = Map::new();
        for key in keys {
            if let Some(value) = body.remove(&key) {
                withheld.insert(key, value);
            }
        }
        if let Some(odata_type) = body.get(ODATA_TYPE) {
            withheld.insert(ODATA_TYPE.to_string(), odata_type.clone());
        }
        debug!(keys = withheld.len(), "withheld properties until after create");
        stash.insert(&WITHHELD, withheld);
        Ok(())
    }

    async fn post(&self, ctx: &mut ActionContext<'_>, stash: &mut Stash) -> ProviderResult<()> {
        let Some(withheld) = stash.take(&WITHHELD) else {
            return Ok(());
        };
        ctx.client
            .patch(ctx.entity_uri()?, &Value::Object(withheld), &[200, 204])
            .await?;
        Ok(())
    }
}
