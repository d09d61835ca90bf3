//! Per-resource raw JSON hooks.
//!
//! Business rules that do not fit the schema (renaming a property on one
//! endpoint, dropping a server-generated field, ...) are expressed as
//! middleware that edits the Graph JSON right at the translation boundary.

use crate::error::{ProviderError, ProviderResult};
use crate::subaction::Operation;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub trait Middleware: Send + Sync + fmt::Debug {
    /// Edits a create or update body after translation from the plan.
    fn terraform_to_graph(&self, _operation: Operation, _raw: &mut Map<String, Value>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Edits a read response before translation into state.
    fn graph_to_terraform(&self, _raw: &mut Map<String, Value>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runs every hook's `terraform_to_graph` in order.
pub(crate) fn to_graph(
    middleware: &[Arc<dyn Middleware>],
    operation: Operation,
    raw: &mut Map<String, Value>,
) -> ProviderResult<()> {
    for hook in middleware {
        hook.terraform_to_graph(operation, raw)
            .map_err(ProviderError::Middleware)?;
    }
    Ok(())
}

/// Runs every hook's `graph_to_terraform` in order.
pub(crate) fn to_terraform(middleware: &[Arc<dyn Middleware>], raw: &mut Map<String, Value>) -> ProviderResult<()> {
    for hook in middleware {
        hook.graph_to_terraform(raw).map_err(ProviderError::Middleware)?;
    }
    Ok(())
}
