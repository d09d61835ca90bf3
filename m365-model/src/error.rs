use thiserror::Error;

/// Result type for schema and translator operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error)]
pub enum ModelError {
    /// A translator recognized a value but could not rewrite it.
    #[error("{translator}: {message}")]
    Translation {
        translator: &'static str,
        message: String,
    },

    /// A schema path does not resolve to an attribute.
    #[error("unknown schema path: {0}")]
    UnknownPath(String),
}

impl ModelError {
    pub(crate) fn translation(translator: &'static str, message: impl Into<String>) -> Self {
        Self::Translation {
            translator,
            message: message.into(),
        }
    }
}
