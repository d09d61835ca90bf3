//! Error types for content encryption.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Reading the source or writing the encrypted file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key or corrupt data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The HMAC does not match the ciphertext.
    #[error("content MAC does not match")]
    MacMismatch,

    /// Invalid key length.
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A base64 field of the encryption info could not be decoded.
    #[error("invalid encoding of {field}: {message}")]
    InvalidEncoding { field: &'static str, message: String },
}
