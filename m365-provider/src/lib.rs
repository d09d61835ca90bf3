//! Resource engine of the M365 provider.
//!
//! A resource type is a [`ResourceDefinition`] run by [`GenericResource`]:
//! plans are translated to Graph JSON, written through the transport and
//! read back into state. Writes that Graph cannot take in one request are
//! split into [`subaction`]s that run before and after the primary call,
//! including the mobile app [`content`] upload pipeline.
//!
//! Host-facing calls never return `Err`. Failures surface as diagnostics
//! on the returned [`ResourceResponse`].

mod config;
pub mod content;
mod data_source;
mod error;
mod logging;
mod middleware;
pub mod package;
mod policy;
mod private_state;
mod resource;
pub mod subaction;

pub use config::{ContentConfig, ENV_API_VERSION, ENV_BASE_URL, ProviderConfig};
pub use content::{ContentPrivateData, MobileAppContent};
pub use data_source::{FILTER_ATTRIBUTE, PluralDataSource, SingularDataSource};
pub use error::{ProviderError, ProviderResult};
pub use logging::{LOG_ENV, init_logging};
pub use middleware::Middleware;
pub use policy::{CriticalSection, PollPolicy, PollState, Sleeper, TokioSleeper, poll_until};
pub use private_state::{MemoryPrivateState, PrivateState};
pub use resource::{GenericResource, ID_ATTRIBUTE, ReadOptions, ResourceDefinition, ResourceResponse};
pub use subaction::{ActionContext, Operation, Stash, StashKey, SubAction, SubActions};
