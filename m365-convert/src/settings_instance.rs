//! Semantic equality for settings-catalog collections.
//!
//! Settings instances are exchanged as a set of JSON strings. Graph returns
//! them in its own order and decorates them with metadata the practitioner
//! never wrote, so a literal comparison would plan a replacement of the
//! whole set on every refresh.

use crate::object_filter::{last_key, traverse};
use crate::plan::{PlanModifier, PlanModifyRequest, PlanModifyResponse};
use m365_types::TypedValue;
use serde_json::Value;

const DEFAULT_VOLATILE_KEYS: &[&str] = &["@odata.context", "@odata.id"];

/// Keeps the prior state when the planned settings set only differs from
/// it by element order or server-injected metadata.
///
/// Both sides are projected element by element: null-valued properties,
/// the volatile keys and the top-level `id` are stripped, each projection is
/// re-serialized, and the projections are sorted. Equal projections mean the
/// plan is replaced by the state value as-is.
#[derive(Debug, Clone)]
pub struct SettingsInstanceEquality {
    volatile_keys: Vec<String>,
}

impl Default for SettingsInstanceEquality {
    fn default() -> Self {
        Self {
            volatile_keys: DEFAULT_VOLATILE_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl SettingsInstanceEquality {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also strips `key` wherever it appears.
    #[must_use]
    pub fn with_volatile_key(mut self, key: impl Into<String>) -> Self {
        self.volatile_keys.push(key.into());
        self
    }

    /// Returns the sorted projections of `items`, or `None` if any element
    /// is not a known string.
    fn canonical(&self, items: &[TypedValue]) -> Option<Vec<String>> {
        let mut projected = items
            .iter()
            .map(|item| item.as_str().map(|s| self.project(s)))
            .collect::<Option<Vec<_>>>()?;
        projected.sort();
        Some(projected)
    }

    fn project(&self, raw: &str) -> String {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => traverse(&value, |path, v| self.keep(path, v)).to_string(),
            Err(_) => raw.to_string(),
        }
    }

    fn keep(&self, path: &str, value: &Value) -> bool {
        if value.is_null() || path == "/id" {
            return false;
        }
        match last_key(path) {
            Some(key) => !self.volatile_keys.iter().any(|k| k == key),
            None => true,
        }
    }
}

impl PlanModifier for SettingsInstanceEquality {
    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse) {
        let Some(state) = request.state else {
            return;
        };
        let TypedValue::Set(state_items) = state else {
            return;
        };
        let TypedValue::Set(plan_items) = &response.plan else {
            return;
        };
        if plan_items.len() != state_items.len() {
            return;
        }
        let (Some(planned), Some(prior)) = (self.canonical(plan_items), self.canonical(state_items)) else {
            return;
        };
        if planned == prior {
            response.plan = state.clone();
        }
    }
}
