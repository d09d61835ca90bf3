//! Core type definitions for the M365 provider.
//!
//! This crate defines the host-facing, resource-agnostic types the rest of
//! the engine is built on:
//! - [`TypedValue`]: the typed attribute tree (plan/state/config)
//! - [`AttrPath`]: addresses a node inside a typed tree
//! - [`Diagnostics`]: accumulated warnings and errors returned to the host
//!
//! Raw Graph payloads are plain `serde_json::Value`s; nothing here knows
//! about Microsoft Graph itself.

mod diagnostics;
mod path;
mod value;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use path::{AttrPath, PathStep};
pub use value::TypedValue;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while navigating or mutating a typed tree.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("attribute path not found: {0}")]
    PathNotFound(AttrPath),

    #[error("cannot step into {kind} value at {path}")]
    NotAContainer { path: AttrPath, kind: &'static str },

    #[error("index {index} out of bounds at {path}")]
    IndexOutOfBounds { path: AttrPath, index: usize },
}
