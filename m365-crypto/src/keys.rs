//! Per-upload key material.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the AES and HMAC keys in bytes.
pub const KEY_SIZE: usize = 32;

/// Size of the AES-CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;

/// Size of the HMAC-SHA256 tag in bytes.
pub const MAC_SIZE: usize = 32;

/// AES key, HMAC key and IV for one upload, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ContentKeys {
    encryption_key: [u8; KEY_SIZE],
    mac_key: [u8; KEY_SIZE],
    iv: [u8; IV_SIZE],
}

impl ContentKeys {
    /// Generates fresh random keys and IV from the OS RNG.
    pub fn random() -> Self {
        let mut keys = Self {
            encryption_key: [0u8; KEY_SIZE],
            mac_key: [0u8; KEY_SIZE],
            iv: [0u8; IV_SIZE],
        };
        rand::rngs::OsRng.fill_bytes(&mut keys.encryption_key);
        rand::rngs::OsRng.fill_bytes(&mut keys.mac_key);
        rand::rngs::OsRng.fill_bytes(&mut keys.iv);
        keys
    }

    pub fn from_bytes(encryption_key: [u8; KEY_SIZE], mac_key: [u8; KEY_SIZE], iv: [u8; IV_SIZE]) -> Self {
        Self {
            encryption_key,
            mac_key,
            iv,
        }
    }

    /// Builds keys from slices, checking every length.
    pub fn from_slices(encryption_key: &[u8], mac_key: &[u8], iv: &[u8]) -> CryptoResult<Self> {
        Ok(Self {
            encryption_key: fixed("encryption key", encryption_key)?,
            mac_key: fixed("MAC key", mac_key)?,
            iv: fixed("initialization vector", iv)?,
        })
    }

    pub fn encryption_key(&self) -> &[u8; KEY_SIZE] {
        &self.encryption_key
    }

    pub fn mac_key(&self) -> &[u8; KEY_SIZE] {
        &self.mac_key
    }

    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }
}

impl std::fmt::Debug for ContentKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKeys")
            .field("encryption_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

fn fixed<const N: usize>(what: &'static str, bytes: &[u8]) -> CryptoResult<[u8; N]> {
    bytes.try_into().map_err(|_| CryptoError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}
