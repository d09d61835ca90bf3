//! Error types for the Graph transport.

use crate::odata::ODataError;
use thiserror::Error;

/// Result type for Graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur talking to Microsoft Graph or Azure Storage.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a status the caller did not accept.
    #[error("{method} {uri} returned {status}: {}", .error.message)]
    Status {
        method: String,
        uri: String,
        status: u16,
        error: ODataError,
        /// The outgoing body, kept when Graph rejects it as a bad request.
        request_body: Option<String>,
    },

    /// No access token could be obtained.
    #[error("authentication error: {0}")]
    Auth(String),

    /// A response body was not the JSON we expected.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A URI could not be composed.
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// A successful response did not have the expected shape.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Local file access during an upload failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GraphError {
    /// Returns true for a 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Returns the HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
