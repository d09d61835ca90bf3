//! Content encryption for Intune mobile app uploads.
//!
//! Intune expects every uploaded package to be encrypted client side with
//! AES-256-CBC (PKCS7 padding) and authenticated with HMAC-SHA256. The
//! encrypted file is laid out as:
//!
//! ```text
//! HMAC-SHA256(IV ‖ ciphertext)  32 bytes
//! IV                            16 bytes
//! ciphertext                    n bytes
//! ```
//!
//! The keys are generated fresh for every upload and handed to the service
//! once, inside [`EncryptionInfo`], when the content file is committed.

mod content;
mod digest;
mod error;
mod keys;

pub use content::{
    EncryptedContent, EncryptionInfo, FILE_DIGEST_ALGORITHM, HEADER_SIZE, PROFILE_IDENTIFIER,
    decrypt_content, encrypt_content, encrypt_file,
};
pub use digest::{FileDigests, digest_file, digest_reader};
pub use error::{CryptoError, CryptoResult};
pub use keys::{ContentKeys, IV_SIZE, KEY_SIZE, MAC_SIZE};
