//! Streaming AES-256-CBC + HMAC-SHA256 content encryption.

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentKeys, IV_SIZE, MAC_SIZE};
use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Encryption profile understood by the Intune service.
pub const PROFILE_IDENTIFIER: &str = "ProfileVersion1";

/// Algorithm of [`EncryptionInfo::file_digest`].
pub const FILE_DIGEST_ALGORITHM: &str = "SHA256";

/// Bytes preceding the ciphertext: the MAC, then the IV.
pub const HEADER_SIZE: usize = MAC_SIZE + IV_SIZE;

const BLOCK_SIZE: usize = 16;
const CHUNK_SIZE: usize = 64 * 1024;

/// The `fileEncryptionInfo` submitted when committing a content file.
///
/// All binary fields are standard base64. `file_digest` is the SHA-256 of
/// the plaintext, not of the encrypted file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionInfo {
    pub encryption_key: String,
    pub mac_key: String,
    pub initialization_vector: String,
    pub mac: String,
    pub profile_identifier: String,
    pub file_digest: String,
    pub file_digest_algorithm: String,
}

impl EncryptionInfo {
    /// Decodes the key material.
    pub fn keys(&self) -> CryptoResult<ContentKeys> {
        ContentKeys::from_slices(
            &decode("encryptionKey", &self.encryption_key)?,
            &decode("macKey", &self.mac_key)?,
            &decode("initializationVector", &self.initialization_vector)?,
        )
    }

    fn mac_bytes(&self) -> CryptoResult<Vec<u8>> {
        decode("mac", &self.mac)
    }

    fn file_digest_bytes(&self) -> CryptoResult<Vec<u8>> {
        decode("fileDigest", &self.file_digest)
    }
}

impl std::fmt::Debug for EncryptionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionInfo")
            .field("encryption_key", &"[REDACTED]")
            .field("mac_key", &"[REDACTED]")
            .field("initialization_vector", &self.initialization_vector)
            .field("mac", &self.mac)
            .field("profile_identifier", &self.profile_identifier)
            .field("file_digest", &self.file_digest)
            .field("file_digest_algorithm", &self.file_digest_algorithm)
            .finish()
    }
}

/// Result of encrypting one package.
#[derive(Debug, Clone)]
pub struct EncryptedContent {
    pub info: EncryptionInfo,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Size of the encrypted file, header included.
    pub encrypted_size: u64,
}

/// Encrypts `source` into `destination` with freshly generated keys.
pub fn encrypt_file(source: &Path, destination: &Path) -> CryptoResult<EncryptedContent> {
    let keys = ContentKeys::random();
    let reader = BufReader::new(File::open(source)?);
    let writer = File::create(destination)?;
    let encrypted = encrypt_content(&keys, reader, writer)?;
    debug!(
        source = %source.display(),
        size = encrypted.size,
        encrypted_size = encrypted.encrypted_size,
        "encrypted content"
    );
    Ok(encrypted)
}

/// Encrypts everything `reader` yields into `writer`.
///
/// The MAC slot at the start of `writer` is written as zeros first and
/// filled in once the whole ciphertext has been authenticated, which is why
/// `writer` must be seekable.
pub fn encrypt_content<R: Read, W: Write + Seek>(
    keys: &ContentKeys,
    mut reader: R,
    mut writer: W,
) -> CryptoResult<EncryptedContent> {
    let mut cipher = Aes256CbcEnc::new_from_slices(keys.encryption_key(), keys.iv())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let mut mac = HmacSha256::new_from_slice(keys.mac_key())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    let mut digest = Sha256::new();

    writer.write_all(&[0u8; MAC_SIZE])?;
    writer.write_all(keys.iv())?;
    mac.update(keys.iv());

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut pending = 0usize;
    let mut size = 0u64;
    let mut encrypted_size = HEADER_SIZE as u64;

    loop {
        let n = reader.read(&mut buf[pending..])?;
        if n == 0 {
            break;
        }
        digest.update(&buf[pending..pending + n]);
        size += n as u64;
        pending += n;

        // Encrypt whole blocks now; a partial block waits for more input
        // or for the final padded block.
        let whole = pending - pending % BLOCK_SIZE;
        for block in buf[..whole].chunks_exact_mut(BLOCK_SIZE) {
            cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        mac.update(&buf[..whole]);
        writer.write_all(&buf[..whole])?;
        encrypted_size += whole as u64;
        buf.copy_within(whole..pending, 0);
        pending -= whole;
    }

    let mut tail = [0u8; 2 * BLOCK_SIZE];
    tail[..pending].copy_from_slice(&buf[..pending]);
    let last = cipher
        .encrypt_padded_mut::<Pkcs7>(&mut tail, pending)
        .map_err(|_| CryptoError::Encryption("padding failed".to_string()))?;
    mac.update(last);
    writer.write_all(last)?;
    encrypted_size += last.len() as u64;

    let tag = mac.finalize().into_bytes();
    writer.seek(SeekFrom::Start(0))?;
    writer.write_all(&tag)?;
    writer.flush()?;

    let info = EncryptionInfo {
        encryption_key: STANDARD.encode(keys.encryption_key()),
        mac_key: STANDARD.encode(keys.mac_key()),
        initialization_vector: STANDARD.encode(keys.iv()),
        mac: STANDARD.encode(tag),
        profile_identifier: PROFILE_IDENTIFIER.to_string(),
        file_digest: STANDARD.encode(digest.finalize()),
        file_digest_algorithm: FILE_DIGEST_ALGORITHM.to_string(),
    };

    Ok(EncryptedContent {
        info,
        size,
        encrypted_size,
    })
}

/// Verifies and decrypts a complete encrypted file.
///
/// Checks the embedded MAC, the MAC recorded in `info`, and the plaintext
/// digest.
pub fn decrypt_content(info: &EncryptionInfo, encrypted: &[u8]) -> CryptoResult<Vec<u8>> {
    if encrypted.len() < HEADER_SIZE + BLOCK_SIZE {
        return Err(CryptoError::Decryption("data too short".to_string()));
    }
    let keys = info.keys()?;
    let (tag, body) = encrypted.split_at(MAC_SIZE);
    if info.mac_bytes()? != tag {
        return Err(CryptoError::MacMismatch);
    }

    let mut mac = HmacSha256::new_from_slice(keys.mac_key())
        .map_err(|e| CryptoError::Decryption(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(tag).map_err(|_| CryptoError::MacMismatch)?;

    let (iv, ciphertext) = body.split_at(IV_SIZE);
    let plaintext = Aes256CbcDec::new_from_slices(keys.encryption_key(), iv)
        .map_err(|e| CryptoError::Decryption(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::Decryption("invalid padding".to_string()))?;

    if Sha256::digest(&plaintext).as_slice() != info.file_digest_bytes()?.as_slice() {
        return Err(CryptoError::Decryption("file digest mismatch".to_string()));
    }
    Ok(plaintext)
}

fn decode(field: &'static str, value: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::InvalidEncoding {
            field,
            message: e.to_string(),
        })
}
