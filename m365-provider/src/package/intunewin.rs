//! `.intunewin` packages produced by the Win32 Content Prep Tool.
//!
//! The package is a zip holding `IntuneWinPackage/Metadata/Detection.xml`
//! and an already encrypted payload under `IntuneWinPackage/Contents/`.
//! Detection.xml carries the payload's encryption parameters, so nothing is
//! encrypted again before upload.

use crate::error::{ProviderError, ProviderResult};
use m365_crypto::EncryptionInfo;
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

const METADATA_ENTRY: &str = "IntuneWinPackage/Metadata/Detection.xml";
const CONTENTS_PREFIX: &str = "IntuneWinPackage/Contents/";

/// The fields of Detection.xml the upload needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionMetadata {
    /// Display name of the packaged application.
    pub name: String,
    /// Name of the encrypted payload inside `Contents/`.
    pub file_name: String,
    pub setup_file: Option<String>,
    pub unencrypted_size: u64,
    pub encryption_info: EncryptionInfo,
}

/// Parses Detection.xml.
pub fn parse_detection_xml(xml: &str) -> ProviderResult<DetectionMetadata> {
    let texts = element_texts(xml)?;
    let required = |path: &str| -> ProviderResult<String> {
        texts
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::package(format!("Detection.xml lacks {path}")))
    };
    let encryption = |field: &str| required(&format!("ApplicationInfo/EncryptionInfo/{field}"));

    let size = required("ApplicationInfo/UnencryptedContentSize")?;
    let unencrypted_size = size
        .trim()
        .parse()
        .map_err(|_| ProviderError::package(format!("invalid UnencryptedContentSize {size:?}")))?;

    Ok(DetectionMetadata {
        name: required("ApplicationInfo/Name")?,
        file_name: required("ApplicationInfo/FileName")?,
        setup_file: texts.get("ApplicationInfo/SetupFile").cloned(),
        unencrypted_size,
        encryption_info: EncryptionInfo {
            encryption_key: encryption("EncryptionKey")?,
            mac_key: encryption("MacKey")?,
            initialization_vector: encryption("InitializationVector")?,
            mac: encryption("Mac")?,
            profile_identifier: encryption("ProfileIdentifier")?,
            file_digest: encryption("FileDigest")?,
            file_digest_algorithm: encryption("FileDigestAlgorithm")?,
        },
    })
}

/// Reads the metadata of the package at `path` and copies its encrypted
/// payload to `payload_destination`. Returns the metadata and the payload
/// size.
pub fn extract(path: &Path, payload_destination: &Path) -> ProviderResult<(DetectionMetadata, u64)> {
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let xml = read_entry_to_string(&mut archive, METADATA_ENTRY)?;
    let metadata = parse_detection_xml(&xml)?;

    let payload_name = format!("{CONTENTS_PREFIX}{}", metadata.file_name);
    let mut payload = archive
        .by_name(&payload_name)
        .map_err(|_| ProviderError::package(format!("{} lacks {payload_name}", path.display())))?;
    let mut out = File::create(payload_destination)?;
    let copied = io::copy(&mut payload, &mut out)?;
    debug!(package = %path.display(), payload = %payload_name, bytes = copied, "extracted intunewin payload");

    Ok((metadata, copied))
}

fn read_entry_to_string<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> ProviderResult<String> {
    let mut entry = archive
        .by_name(name)
        .map_err(|_| ProviderError::package(format!("missing entry {name}")))?;
    let mut text = String::new();
    entry
        .read_to_string(&mut text)
        .map_err(|e| ProviderError::package(format!("{name}: {e}")))?;
    Ok(text)
}

/// Collects the text of every element keyed by its slash-joined element
/// path, e.g. `ApplicationInfo/EncryptionInfo/MacKey`.
fn element_texts(xml: &str) -> ProviderResult<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut texts = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| ProviderError::package(format!("Detection.xml: {e}")))?;
                texts.insert(stack.join("/"), text.into_owned());
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ProviderError::package(format!(
                    "Detection.xml at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }
    Ok(texts)
}
