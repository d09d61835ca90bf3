//! APPX and MSIX packages and bundles.

use crate::error::{ProviderError, ProviderResult};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

const PACKAGE_MANIFEST: &str = "AppxManifest.xml";
const BUNDLE_MANIFEST: &str = "AppxMetadata/AppxBundleManifest.xml";

/// Crockford base32 alphabet, lowercase, as used in package family names.
const PUBLISHER_ALPHABET: &[u8; 32] = b"0123456789abcdefghjkmnpqrstvwxyz";

/// The `<Identity>` of a package or bundle manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppxIdentity {
    pub name: String,
    pub publisher: String,
    pub version: String,
    pub processor_architecture: Option<String>,
}

impl AppxIdentity {
    /// Fills the identity properties of a `windowsUniversalAppX` or
    /// `windowsAppX` body that the practitioner left unset.
    pub fn apply_to(&self, body: &mut Map<String, Value>) {
        let mut fill = |key: &str, value: String| {
            let unset = body.get(key).is_none_or(Value::is_null);
            if unset {
                body.insert(key.to_string(), Value::String(value));
            }
        };
        fill("identityName", self.name.clone());
        fill("identityPublisherHash", publisher_hash(&self.publisher));
        fill("identityVersion", self.version.clone());
        if let Some(architecture) = &self.processor_architecture {
            fill("applicableArchitectures", architecture.to_ascii_lowercase());
        }
    }
}

/// Reads the identity from the package manifest, or from the bundle
/// manifest for `.appxbundle`/`.msixbundle` files.
pub fn read_identity(path: &Path) -> ProviderResult<AppxIdentity> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let entry_name = [PACKAGE_MANIFEST, BUNDLE_MANIFEST]
        .into_iter()
        .find(|name| archive.file_names().any(|entry| entry == *name))
        .ok_or_else(|| ProviderError::package(format!("{} has no app manifest", path.display())))?;

    let mut xml = String::new();
    archive
        .by_name(entry_name)?
        .read_to_string(&mut xml)
        .map_err(|e| ProviderError::package(format!("{entry_name}: {e}")))?;
    parse_identity(&xml)
}

/// Parses the first `<Identity>` element of a manifest.
pub fn parse_identity(xml: &str) -> ProviderResult<AppxIdentity> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"Identity" => {
                let mut name = None;
                let mut publisher = None;
                let mut version = None;
                let mut processor_architecture = None;
                for attr in e.attributes().flatten() {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| ProviderError::package(format!("Identity: {e}")))?
                        .into_owned();
                    match attr.key.local_name().as_ref() {
                        b"Name" => name = Some(value),
                        b"Publisher" => publisher = Some(value),
                        b"Version" => version = Some(value),
                        b"ProcessorArchitecture" => processor_architecture = Some(value),
                        _ => {}
                    }
                }
                let missing = |attr: &str| ProviderError::package(format!("Identity lacks {attr}"));
                return Ok(AppxIdentity {
                    name: name.ok_or_else(|| missing("Name"))?,
                    publisher: publisher.ok_or_else(|| missing("Publisher"))?,
                    version: version.ok_or_else(|| missing("Version"))?,
                    processor_architecture,
                });
            }
            Ok(Event::Eof) => return Err(ProviderError::package("manifest has no Identity element")),
            Ok(_) => {}
            Err(e) => {
                return Err(ProviderError::package(format!(
                    "manifest at position {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }
}

/// The publisher id of a package family name: the first 8 bytes of the
/// SHA-256 of the UTF-16LE publisher, padded to 65 bits and written as 13
/// base32 digits.
pub fn publisher_hash(publisher: &str) -> String {
    let utf16: Vec<u8> = publisher.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let digest = Sha256::digest(&utf16);
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let bits = u128::from(u64::from_be_bytes(prefix)) << 1;

    (0..13)
        .map(|i| {
            let index = (bits >> (60 - 5 * i)) & 0x1f;
            char::from(PUBLISHER_ALPHABET[index as usize])
        })
        .collect()
}
