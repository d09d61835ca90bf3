//! Whole-file digests used for change detection and upload integrity.

use crate::error::CryptoResult;
use base64::{Engine, engine::general_purpose::STANDARD};
use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const CHUNK_SIZE: usize = 64 * 1024;

/// MD5 and SHA-256 of one file, computed in a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileDigests {
    pub md5: [u8; 16],
    pub sha256: [u8; 32],
    pub size: u64,
}

impl FileDigests {
    /// The form Azure Storage expects in `Content-MD5` style headers.
    pub fn md5_base64(&self) -> String {
        STANDARD.encode(self.md5)
    }

    pub fn sha256_hex(&self) -> String {
        hex::encode(self.sha256)
    }
}

pub fn digest_reader<R: Read>(mut reader: R) -> CryptoResult<FileDigests> {
    let mut md5 = Md5::new();
    let mut sha256 = Sha256::new();
    let mut size = 0u64;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        sha256.update(&buf[..n]);
        size += n as u64;
    }
    Ok(FileDigests {
        md5: md5.finalize().into(),
        sha256: sha256.finalize().into(),
        size,
    })
}

pub fn digest_file(path: &Path) -> CryptoResult<FileDigests> {
    digest_reader(BufReader::new(File::open(path)?))
}
