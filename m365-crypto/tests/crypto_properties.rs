//! Property-based tests for content encryption.
//!
//! - Decryption with the generated keys reproduces the plaintext
//! - The embedded MAC authenticates IV and ciphertext
//! - Any single-bit corruption is detected

use m365_crypto::{ContentKeys, CryptoError, HEADER_SIZE, decrypt_content, encrypt_content};
use proptest::prelude::*;
use std::io::Cursor;

fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..70_000)
}

fn encrypt(plaintext: &[u8]) -> (m365_crypto::EncryptionInfo, Vec<u8>) {
    let mut out = Cursor::new(Vec::new());
    let encrypted = encrypt_content(&ContentKeys::random(), plaintext, &mut out).unwrap();
    (encrypted.info, out.into_inner())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Encryption followed by decryption returns the original plaintext.
    #[test]
    fn roundtrip_preserves_data(plaintext in plaintext_strategy()) {
        let (info, bytes) = encrypt(&plaintext);
        prop_assert_eq!(decrypt_content(&info, &bytes).unwrap(), plaintext);
    }

    /// Ciphertext length is the header plus the PKCS7-padded plaintext.
    #[test]
    fn ciphertext_length_is_padded(plaintext in plaintext_strategy()) {
        let (_, bytes) = encrypt(&plaintext);
        let padded = (plaintext.len() / 16 + 1) * 16;
        prop_assert_eq!(bytes.len(), HEADER_SIZE + padded);
    }

    /// Flipping any bit after the MAC slot fails authentication.
    #[test]
    fn corruption_is_detected(plaintext in plaintext_strategy(), position in any::<prop::sample::Index>(), bit in 0u8..8) {
        let (info, mut bytes) = encrypt(&plaintext);
        let offset = 32 + position.index(bytes.len() - 32);
        bytes[offset] ^= 1 << bit;
        prop_assert!(matches!(decrypt_content(&info, &bytes), Err(CryptoError::MacMismatch)));
    }
}
