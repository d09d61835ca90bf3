use base64::{Engine, engine::general_purpose::STANDARD};
use m365_crypto::{
    ContentKeys, CryptoError, EncryptionInfo, FILE_DIGEST_ALGORITHM, HEADER_SIZE, IV_SIZE, KEY_SIZE,
    PROFILE_IDENTIFIER, decrypt_content, digest_file, digest_reader, encrypt_content, encrypt_file,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;

fn fixed_keys() -> ContentKeys {
    ContentKeys::from_bytes([7u8; KEY_SIZE], [9u8; KEY_SIZE], [3u8; IV_SIZE])
}

fn encrypt(keys: &ContentKeys, plaintext: &[u8]) -> (EncryptionInfo, Vec<u8>) {
    let mut out = Cursor::new(Vec::new());
    let encrypted = encrypt_content(keys, plaintext, &mut out).unwrap();
    assert_eq!(encrypted.size, plaintext.len() as u64);
    assert_eq!(encrypted.encrypted_size, out.get_ref().len() as u64);
    (encrypted.info.clone(), out.into_inner())
}

// ── Layout ──────────────────────────────────────────────────────

#[test]
fn output_is_mac_iv_then_padded_ciphertext() {
    let keys = fixed_keys();
    let (_, bytes) = encrypt(&keys, &[0u8; 20]);
    // 20 bytes pad to 32
    assert_eq!(bytes.len(), HEADER_SIZE + 32);
    assert_eq!(&bytes[32..48], keys.iv());
}

#[test]
fn exact_block_multiple_gets_a_full_padding_block() {
    let (_, bytes) = encrypt(&fixed_keys(), &[1u8; 32]);
    assert_eq!(bytes.len(), HEADER_SIZE + 48);
}

#[test]
fn empty_input_is_one_padding_block() {
    let (info, bytes) = encrypt(&fixed_keys(), &[]);
    assert_eq!(bytes.len(), HEADER_SIZE + 16);
    assert_eq!(decrypt_content(&info, &bytes).unwrap(), Vec::<u8>::new());
}

#[test]
fn info_describes_the_profile() {
    let plaintext = b"abc";
    let (info, bytes) = encrypt(&fixed_keys(), plaintext);
    assert_eq!(info.profile_identifier, PROFILE_IDENTIFIER);
    assert_eq!(info.file_digest_algorithm, FILE_DIGEST_ALGORITHM);
    assert_eq!(
        info.file_digest,
        STANDARD.encode(hex_bytes("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"))
    );
    assert_eq!(STANDARD.decode(&info.mac).unwrap(), bytes[..32].to_vec());
    assert_eq!(STANDARD.decode(&info.encryption_key).unwrap(), vec![7u8; KEY_SIZE]);
}

#[test]
fn info_serializes_camel_case() {
    let (info, _) = encrypt(&fixed_keys(), b"payload");
    let json = serde_json::to_value(&info).unwrap();
    for key in [
        "encryptionKey",
        "macKey",
        "initializationVector",
        "mac",
        "profileIdentifier",
        "fileDigest",
        "fileDigestAlgorithm",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    let back: EncryptionInfo = serde_json::from_value(json).unwrap();
    assert_eq!(back, info);
}

#[test]
fn debug_output_redacts_keys() {
    let (info, _) = encrypt(&fixed_keys(), b"payload");
    let debug = format!("{info:?}");
    assert!(!debug.contains(&info.encryption_key));
    assert!(!debug.contains(&info.mac_key));
    assert!(format!("{:?}", fixed_keys()).contains("REDACTED"));
}

// ── Verification ────────────────────────────────────────────────

#[test]
fn large_input_round_trips_across_chunks() {
    let plaintext: Vec<u8> = (0..200_003u32).map(|i| (i % 251) as u8).collect();
    let (info, bytes) = encrypt(&ContentKeys::random(), &plaintext);
    assert_eq!(decrypt_content(&info, &bytes).unwrap(), plaintext);
}

#[test]
fn tampered_ciphertext_is_rejected() {
    let (info, mut bytes) = encrypt(&fixed_keys(), b"some installer bytes");
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;
    assert!(matches!(decrypt_content(&info, &bytes), Err(CryptoError::MacMismatch)));
}

#[test]
fn tampered_iv_is_rejected() {
    let (info, mut bytes) = encrypt(&fixed_keys(), b"some installer bytes");
    bytes[40] ^= 0xff;
    assert!(matches!(decrypt_content(&info, &bytes), Err(CryptoError::MacMismatch)));
}

#[test]
fn truncated_data_is_rejected() {
    let (info, bytes) = encrypt(&fixed_keys(), b"x");
    assert!(matches!(
        decrypt_content(&info, &bytes[..HEADER_SIZE]),
        Err(CryptoError::Decryption(_))
    ));
}

#[test]
fn fresh_keys_differ_per_upload() {
    let (a, _) = encrypt(&ContentKeys::random(), b"same");
    let (b, _) = encrypt(&ContentKeys::random(), b"same");
    assert_ne!(a.encryption_key, b.encryption_key);
    assert_ne!(a.mac_key, b.mac_key);
    assert_ne!(a.initialization_vector, b.initialization_vector);
    assert_eq!(a.file_digest, b.file_digest);
}

#[test]
fn wrong_key_length_is_reported() {
    let err = ContentKeys::from_slices(&[0u8; 16], &[0u8; 32], &[0u8; 16]).unwrap_err();
    assert!(matches!(
        err,
        CryptoError::InvalidLength {
            expected: 32,
            actual: 16,
            ..
        }
    ));
}

#[test]
fn invalid_base64_in_info_is_reported() {
    let (mut info, bytes) = encrypt(&fixed_keys(), b"x");
    info.mac_key = "***".to_string();
    assert!(matches!(
        decrypt_content(&info, &bytes),
        Err(CryptoError::InvalidEncoding { field: "macKey", .. })
    ));
}

// ── Files and digests ───────────────────────────────────────────

#[test]
fn encrypt_file_writes_destination() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("setup.msi");
    let destination = dir.path().join("setup.msi.bin");
    std::fs::write(&source, vec![42u8; 5000]).unwrap();

    let encrypted = encrypt_file(&source, &destination).unwrap();
    let bytes = std::fs::read(&destination).unwrap();

    assert_eq!(encrypted.size, 5000);
    assert_eq!(encrypted.encrypted_size, bytes.len() as u64);
    assert_eq!(decrypt_content(&encrypted.info, &bytes).unwrap(), vec![42u8; 5000]);
}

#[test]
fn digests_match_known_vectors() {
    let digests = digest_reader(&b"abc"[..]).unwrap();
    assert_eq!(digests.md5_base64(), "kAFQmDzST7DWlj99KOF/cg==");
    assert_eq!(
        digests.sha256_hex(),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(digests.size, 3);
}

#[test]
fn digest_of_empty_file() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let digests = digest_file(file.path()).unwrap();
    assert_eq!(digests.md5_base64(), "1B2M2Y8AsgTpgAmY7PhCfg==");
    assert_eq!(digests.size, 0);
}

fn hex_bytes(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}
