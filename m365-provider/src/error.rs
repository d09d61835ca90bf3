//! Error types for the provider layer.

use m365_convert::ConvertError;
use m365_crypto::CryptoError;
use m365_graph::GraphError;
use m365_model::ModelError;
use m365_types::{AttrPath, Diagnostics};
use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised while carrying out a resource operation.
///
/// Host-facing calls never return these; they are folded into
/// [`Diagnostics`] with [`ProviderError::report`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Path(#[from] m365_types::Error),

    /// A per-resource middleware hook failed.
    #[error("middleware failed: {0:#}")]
    Middleware(anyhow::Error),

    /// An app package could not be read.
    #[error("invalid package: {0}")]
    Package(String),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// A polled resource reached a state that is neither pending nor done.
    #[error("{what} reached unexpected state {state:?}")]
    UnexpectedState { what: String, state: String },

    /// A poll gave up before reaching the done state.
    #[error("gave up waiting for {what} after {attempts} attempts")]
    PollExhausted { what: String, attempts: u32 },

    /// A lookup through a collection endpoint came back empty.
    #[error("not found: {0}")]
    NotFound(String),

    /// A value needed to build a request is missing from plan or state.
    #[error("missing attribute: {0}")]
    MissingAttribute(String),

    /// A Graph response lacked a field the operation depends on.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn package(message: impl Into<String>) -> Self {
        Self::Package(message.into())
    }

    /// Returns true if Graph answered 404 or an empty collection where one
    /// entity was expected.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Graph(e) => e.is_not_found(),
            Self::NotFound(_) => true,
            _ => false,
        }
    }

    /// Detail text for a diagnostic. A rejected request body is appended so
    /// the practitioner can see what was sent.
    pub fn detail(&self) -> String {
        match self {
            Self::Graph(GraphError::Status {
                request_body: Some(body),
                ..
            }) => format!("{self}\n\nRequest body:\n{body}"),
            _ => self.to_string(),
        }
    }

    /// The attribute a conversion error points at.
    pub fn path(&self) -> Option<&AttrPath> {
        match self {
            Self::Convert(
                ConvertError::TypeMismatch { path, .. }
                | ConvertError::Translator { path, .. }
                | ConvertError::InvalidJson { path, .. }
                | ConvertError::AmbiguousDerivedType { path, .. },
            ) => Some(path),
            _ => None,
        }
    }

    /// Adds this error to `diagnostics` as an error entry.
    pub fn report(&self, diagnostics: &mut Diagnostics, summary: impl Into<String>) {
        match self.path() {
            Some(path) => diagnostics.add_attribute_error(path.clone(), summary, self.detail()),
            None => diagnostics.add_error(summary, self.detail()),
        }
    }
}
