//! Schema-driven conversion between the host's typed attribute tree and
//! Microsoft Graph JSON.
//!
//! - [`graph_to_typed`] / [`typed_to_graph`]: the two translation directions
//! - [`modify_plan`]: plan-time defaults and reconciliation
//! - [`traverse`]: recursive filtering of raw JSON
//! - [`unwrap_single`]: single-entity reads through collection endpoints

mod collection;
mod error;
mod object_filter;
mod plan;
mod settings_instance;
mod to_graph;
mod to_typed;

pub use collection::{SingleItem, unwrap_single};
pub use error::{ConvertError, ConvertResult};
pub use object_filter::{last_key, traverse};
pub use plan::{
    DefaultValue, ImmutableWarning, PlanModifier, PlanModifiers, PlanModifyRequest,
    PlanModifyResponse, modify_plan,
};
pub use settings_instance::SettingsInstanceEquality;
pub use to_graph::{object_to_graph, typed_to_graph};
pub use to_typed::{graph_to_typed, literal_to_typed, object_to_typed};
