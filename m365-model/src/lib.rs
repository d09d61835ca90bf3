//! Schema model for the M365 provider.
//!
//! Defines the read-only description every resource hands to the engine:
//! - [`Attribute`]: one named node with its kind, mode and Graph name
//! - [`AttributeKind`]: the closed set of attribute shapes
//! - [`ObjectSchema`] / [`ResourceSchema`]: attribute sets and the resource root
//! - [`ValueTranslator`]: per-path value rewrite rules, kept in a side table
//!
//! The schema is data. The conversion engine in `m365-convert` walks it; nothing
//! here performs conversion itself.

mod error;
mod schema;
mod translator;

pub use error::{ModelError, ModelResult};
pub use schema::{Attribute, AttributeKind, AttributeMode, ObjectSchema, ResourceSchema};
pub use translator::{
    Base64String, EnumMap, GraphInput, Int64String, MissingAsDefault, TranslatorTable, ValueTranslator,
};

/// Name of the OData discriminator property in Graph payloads.
pub const ODATA_TYPE: &str = "@odata.type";
