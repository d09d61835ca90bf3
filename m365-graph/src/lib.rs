//! Microsoft Graph transport for the M365 provider.
//!
//! Everything that talks HTTP lives here:
//! - [`GraphClient`]: authenticated JSON requests with status validation
//!   and retries on throttling and transient failures
//! - [`EntityUri`] and [`QueryOptions`]: URI composition for nested
//!   entities and OData query parameters
//! - [`crud`]: create/read/update/delete/list calls built on the client
//! - [`BlobUploader`]: chunked upload to Azure Storage block blobs
//!
//! Errors carry the parsed OData error so callers can tell "not found"
//! apart from everything else.

mod auth;
mod blob;
mod client;
mod config;
pub mod crud;
mod error;
mod odata;
mod retry;
mod uri;

pub use auth::{StaticToken, TokenProvider};
pub use blob::{BlobUploader, block_id};
pub use client::{GraphClient, GraphResponse};
pub use config::{GraphConfig, RetryConfig};
pub use error::{GraphError, GraphResult};
pub use odata::ODataError;
pub use reqwest::Method;
pub use uri::{EntityUri, ExtraRequest, ParentEntity, QueryOptions, odata_string};
