//! Image manifest schema (Distribution v2, single-manifest).

use serde::{Deserialize, Serialize};

/// Media type for Docker schema 2 manifests served on the read path.
pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Media type for blob content.
pub const OCTET_STREAM_MEDIA_TYPE: &str = "application/octet-stream";

/// A content descriptor: media type, size, and digest of a referenced blob.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

/// An image manifest: a config descriptor plus an ordered list of layers.
///
/// Used for validation only. The stored representation is always the raw
/// request body, byte for byte, because the manifest digest is computed
/// over those exact bytes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl ImageManifest {
    /// Parse and validate a manifest body.
    pub fn parse(data: &[u8]) -> crate::Result<Self> {
        serde_json::from_slice(data).map_err(|e| crate::Error::InvalidManifest(e.to_string()))
    }
}
