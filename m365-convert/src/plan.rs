//! Plan-time reconciliation.
//!
//! Before the host shows a plan, every attribute path runs through a chain
//! of [`PlanModifier`]s: the built-in default filler and immutable-attribute
//! check, then any modifiers registered for that path.

use crate::to_typed::literal_to_typed;
use m365_model::{Attribute, AttributeKind, ObjectSchema, ResourceSchema};
use m365_types::{AttrPath, Diagnostics, TypedValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Inputs of one modifier call at a single attribute path.
#[derive(Debug)]
pub struct PlanModifyRequest<'a> {
    pub path: &'a AttrPath,
    pub attribute: &'a Attribute,
    /// Practitioner configuration; null when unset.
    pub config: &'a TypedValue,
    /// Prior state, absent on create.
    pub state: Option<&'a TypedValue>,
    /// Planned value as modified so far.
    pub plan: &'a TypedValue,
}

/// Output of a modifier: the (possibly replaced) planned value plus
/// diagnostics.
#[derive(Debug, Clone)]
pub struct PlanModifyResponse {
    pub plan: TypedValue,
    pub diagnostics: Diagnostics,
}

/// A plan-time rule attached to an attribute path.
pub trait PlanModifier: Send + Sync + fmt::Debug {
    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse);
}

/// Fills an unset configuration value with the attribute's declared
/// default literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValue;

impl PlanModifier for DefaultValue {
    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse) {
        let Some(literal) = &request.attribute.default else {
            return;
        };
        if !request.config.is_null() {
            return;
        }
        match literal_to_typed(&request.attribute.kind, request.path, literal) {
            Ok(value) => response.plan = value,
            Err(e) => response.diagnostics.add_attribute_error(
                request.path.clone(),
                "Invalid default value",
                e.to_string(),
            ),
        }
    }
}

/// Warns when an attribute that cannot change after creation is planned
/// to differ from state.
///
/// This is a warning rather than an error: destroy-and-recreate planning
/// can present a changed value that is never actually applied in place.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmutableWarning;

impl PlanModifier for ImmutableWarning {
    fn modify(&self, request: &PlanModifyRequest<'_>, response: &mut PlanModifyResponse) {
        if !request.attribute.immutable {
            return;
        }
        let Some(state) = request.state else {
            return;
        };
        if state.is_null() || response.plan.is_unknown() || &response.plan == state {
            return;
        }
        response.diagnostics.add_attribute_warning(
            request.path.clone(),
            "Immutable attribute changed",
            format!(
                "{} cannot be changed after creation; the new value will not be applied \
                 unless the resource is replaced",
                request.path
            ),
        );
    }
}

/// Modifiers registered per dotted schema path, run after the built-ins.
#[derive(Debug, Clone, Default)]
pub struct PlanModifiers {
    entries: HashMap<String, Vec<Arc<dyn PlanModifier>>>,
}

impl PlanModifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, schema_path: impl Into<String>, modifier: Arc<dyn PlanModifier>) {
        self.entries.entry(schema_path.into()).or_default().push(modifier);
    }

    #[must_use]
    pub fn with(mut self, schema_path: impl Into<String>, modifier: Arc<dyn PlanModifier>) -> Self {
        self.insert(schema_path, modifier);
        self
    }

    fn get(&self, schema_path: &str) -> &[Arc<dyn PlanModifier>] {
        self.entries.get(schema_path).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Runs every plan modifier over `plan`.
///
/// Nothing runs when `plan` is null (the resource is being destroyed).
pub fn modify_plan(
    schema: &ResourceSchema,
    config: &TypedValue,
    state: Option<&TypedValue>,
    plan: TypedValue,
    modifiers: &PlanModifiers,
) -> PlanModifyResponse {
    let mut response = PlanModifyResponse {
        plan,
        diagnostics: Diagnostics::new(),
    };
    if response.plan.is_null() {
        return response;
    }
    let state = state.filter(|s| !s.is_null());
    let planner = Planner { modifiers };
    planner.object(
        schema.root(),
        &AttrPath::root(),
        config,
        state,
        &mut response.plan,
        &mut response.diagnostics,
    );
    response
}

struct Planner<'a> {
    modifiers: &'a PlanModifiers,
}

impl Planner<'_> {
    fn object(
        &self,
        schema: &ObjectSchema,
        path: &AttrPath,
        config: &TypedValue,
        state: Option<&TypedValue>,
        plan: &mut TypedValue,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(attrs) = plan.as_object_mut() else {
            return;
        };
        for attribute in schema.attributes() {
            let child_path = path.join_attr(attribute.name.clone());
            let child_config = config.get_attr(&attribute.name).unwrap_or(TypedValue::null_ref());
            let child_state = state.and_then(|s| s.get_attr(&attribute.name));
            let child_plan = attrs
                .entry(attribute.name.clone())
                .or_insert(TypedValue::Null);
            self.attribute(
                attribute,
                &child_path,
                child_config,
                child_state,
                child_plan,
                diagnostics,
            );
        }
    }

    fn attribute(
        &self,
        attribute: &Attribute,
        path: &AttrPath,
        config: &TypedValue,
        state: Option<&TypedValue>,
        plan: &mut TypedValue,
        diagnostics: &mut Diagnostics,
    ) {
        let builtins: [&dyn PlanModifier; 2] = [&DefaultValue, &ImmutableWarning];
        let registered = self.modifiers.get(&path.schema_path());
        let chain = builtins
            .into_iter()
            .chain(registered.iter().map(|m| m.as_ref()));

        for modifier in chain {
            let mut response = PlanModifyResponse {
                plan: plan.clone(),
                diagnostics: Diagnostics::new(),
            };
            let request = PlanModifyRequest {
                path,
                attribute,
                config,
                state,
                plan: &*plan,
            };
            modifier.modify(&request, &mut response);
            diagnostics.extend(response.diagnostics);
            *plan = response.plan;
        }

        self.nested(&attribute.kind, path, config, state, plan, diagnostics);
    }

    fn nested(
        &self,
        kind: &AttributeKind,
        path: &AttrPath,
        config: &TypedValue,
        state: Option<&TypedValue>,
        plan: &mut TypedValue,
        diagnostics: &mut Diagnostics,
    ) {
        match (kind, plan) {
            (
                AttributeKind::Object(schema) | AttributeKind::DerivedTypeObject { attributes: schema, .. },
                plan,
            ) => self.object(schema, path, config, state, plan, diagnostics),
            (AttributeKind::List(element), TypedValue::List(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_config = config
                        .elements()
                        .and_then(|e| e.get(i))
                        .unwrap_or(TypedValue::null_ref());
                    let item_state = state.and_then(TypedValue::elements).and_then(|e| e.get(i));
                    self.nested(element, &path.join_index(i), item_config, item_state, item, diagnostics);
                }
            }
            // Set elements have no position to pair them with config or
            // state, so each element is treated as its own configuration.
            (AttributeKind::Set(element), TypedValue::Set(items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let own = item.clone();
                    self.nested(element, &path.join_index(i), &own, None, item, diagnostics);
                }
            }
            (AttributeKind::Map(element), TypedValue::Map(entries)) => {
                for (key, item) in entries.iter_mut() {
                    let item_config = match config {
                        TypedValue::Map(c) => c.get(key).unwrap_or(TypedValue::null_ref()),
                        _ => TypedValue::null_ref(),
                    };
                    let item_state = match state {
                        Some(TypedValue::Map(s)) => s.get(key),
                        _ => None,
                    };
                    self.nested(element, &path.join_key(key.clone()), item_config, item_state, item, diagnostics);
                }
            }
            _ => {}
        }
    }
}
