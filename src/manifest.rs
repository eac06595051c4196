//! The manifest: the only on-wire structure.
//!
//! A manifest is a small JSON document served at
//! `<api_url>/<cmd_name>/<platform>.json` with capitalized keys and
//! standard-base64 byte fields:
//!
//! ```json
//! {
//!     "Version": "1.3",
//!     "Sha256": "...",
//!     "Signature": "..."
//! }
//! ```
//!
//! An absent or empty `Version` means "no update available". `Signature`
//! is `null` when the release is unsigned.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Version metadata for one published binary.
///
/// `sha256` is the digest of the **uncompressed** target binary, which lets
/// one signature authenticate both the delta-reconstructed and the
/// fully-downloaded candidate. An all-default `Info` is the "no update"
/// sentinel returned by the updater.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Opaque version identifier. Often semver, never interpreted as such.
    #[serde(rename = "Version", default)]
    pub version: String,

    /// SHA-256 of the uncompressed binary; empty when no update is offered.
    #[serde(rename = "Sha256", default, with = "b64")]
    pub sha256: Vec<u8>,

    /// PKCS#1 v1.5 RSA signature of the raw `sha256` bytes, if signed.
    #[serde(rename = "Signature", default, with = "b64_opt")]
    pub signature: Option<Vec<u8>>,
}

impl Info {
    /// True when this manifest offers nothing to install.
    pub fn is_empty(&self) -> bool {
        self.version.is_empty()
    }
}

/// Serialize an [`Info`] as the pretty four-space-indented JSON the release
/// tree carries. The indentation is cosmetic; readers are tolerant.
pub fn encode(info: &Info) -> Result<String> {
    let mut buf = Vec::new();
    let fmt = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, fmt);
    info.serialize(&mut ser).context("failed to encode version info")?;
    String::from_utf8(buf).context("encoded version info was not UTF-8")
}

/// Decode a manifest, tolerating absent fields.
///
/// The only structural check: a manifest that names a version must carry a
/// full 32-byte digest. A zero-length digest is accepted as long as the
/// version is empty too.
pub fn decode(bytes: &[u8]) -> Result<Info> {
    let info: Info = serde_json::from_slice(bytes).context("failed to decode version info")?;
    if !info.version.is_empty() && info.sha256.len() != 32 {
        bail!("bad cmd hash in info. Expected 32 got {}", info.sha256.len());
    }
    Ok(info)
}

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(de)? {
            None => Ok(Vec::new()),
            Some(s) => STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom),
        }
    }
}

mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => ser.serialize_str(&STANDARD.encode(b)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(de)? {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
