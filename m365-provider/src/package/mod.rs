//! Mobile app packages.
//!
//! [`prepare`] turns a source file into an encrypted temp file ready for
//! upload, together with everything the content file and its commit need.

pub mod appx;
pub mod intunewin;

use crate::error::{ProviderError, ProviderResult};
use appx::AppxIdentity;
use m365_crypto::{EncryptionInfo, digest_file, encrypt_file};
use std::path::Path;
use tempfile::{NamedTempFile, TempPath};
use tracing::info;

/// How a source file is turned into upload content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// Already encrypted by the Win32 Content Prep Tool.
    IntuneWin,
    /// APPX/MSIX package or bundle; encrypted here, identity read from the
    /// manifest.
    Appx,
    /// Anything else (MSI, APK, IPA, ...), encrypted here.
    Other,
}

impl PackageKind {
    /// Classifies by file extension, case-insensitively.
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("intunewin") => Self::IntuneWin,
            Some("appx" | "msix" | "appxbundle" | "msixbundle") => Self::Appx,
            _ => Self::Other,
        }
    }
}

/// An encrypted package staged for upload. The temp file is removed when
/// this is dropped.
#[derive(Debug)]
pub struct PreparedContent {
    /// Content file name declared to Intune.
    pub name: String,
    /// Plaintext size.
    pub size: u64,
    pub encrypted_size: u64,
    pub encryption_info: EncryptionInfo,
    /// Base64 MD5 of the encrypted file, sent with the block list.
    pub encrypted_md5: String,
    pub encrypted_file: TempPath,
    pub appx: Option<AppxIdentity>,
}

/// Reads and encrypts the package at `source`. Blocking.
pub fn prepare(source: &Path) -> ProviderResult<PreparedContent> {
    let kind = PackageKind::from_path(source);
    let encrypted_file = NamedTempFile::new()?.into_temp_path();

    let (name, size, encrypted_size, encryption_info, appx) = match kind {
        PackageKind::IntuneWin => {
            // Intune expects the name of the inner payload, not of the wrapper.
            let (metadata, payload_size) = intunewin::extract(source, &encrypted_file)?;
            (
                metadata.file_name.clone(),
                metadata.unencrypted_size,
                payload_size,
                metadata.encryption_info.clone(),
                None,
            )
        }
        PackageKind::Appx | PackageKind::Other => {
            let file_name = source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ProviderError::package(format!("{} has no file name", source.display())))?
                .to_string();
            let appx = match kind {
                PackageKind::Appx => Some(appx::read_identity(source)?),
                _ => None,
            };
            let encrypted = encrypt_file(source, &encrypted_file)?;
            (
                file_name,
                encrypted.size,
                encrypted.encrypted_size,
                encrypted.info.clone(),
                appx,
            )
        }
    };

    let encrypted_md5 = digest_file(&encrypted_file)?.md5_base64();
    info!(
        source = %source.display(),
        kind = ?kind,
        size,
        encrypted_size,
        "prepared app content"
    );
    Ok(PreparedContent {
        name,
        size,
        encrypted_size,
        encryption_info,
        encrypted_md5,
        encrypted_file,
        appx,
    })
}
