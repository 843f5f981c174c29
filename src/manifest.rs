//! Models for manifests, configs, and referrers indexes.
//!
//! Mappings use `BTreeMap`, so the JSON representation of any value has
//! a stable key order, and the bytes produced by [`ArtifactManifest::to_bytes`]
//! can be used to compute the digest of the manifest.
//!
//! Refs:
//!
//! * https://github.com/opencontainers/image-spec/blob/main/manifest.md
//! * https://github.com/opencontainers/image-spec/blob/main/descriptor.md

use std::collections::BTreeMap;

use crate::{Digest, MediaType};

/// Annotations of a manifest or a descriptor.
pub type Annotations = BTreeMap<String, String>;

/// Reference to a blob or a manifest.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: MediaType,
    pub digest: Digest,
    pub size: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<MediaType>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Annotations,

    /// Fields not modeled above, like `urls` or `platform`.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Descriptor {
    pub fn new(media_type: MediaType, digest: Digest, size: i64) -> Self {
        Descriptor {
            media_type,
            digest,
            size,
            artifact_type: None,
            annotations: Default::default(),
            extra: Default::default(),
        }
    }
}

/// Manifest of an artifact.
///
/// The order of `layers` is significant: it determines the serialized
/// bytes, and therefore the digest of the manifest.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactManifest {
    pub schema_version: u32,

    pub media_type: MediaType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<MediaType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Descriptor>,

    #[serde(default)]
    pub layers: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Annotations,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Descriptor>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ArtifactManifest {
    /// Serialize the manifest to compact JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Default for ArtifactManifest {
    fn default() -> Self {
        ArtifactManifest {
            schema_version: 2,
            media_type: MediaType::OCI_MANIFEST,
            artifact_type: None,
            config: None,
            layers: Vec::new(),
            annotations: Default::default(),
            subject: None,
            extra: Default::default(),
        }
    }
}

/// Config document of an artifact.
///
/// Fields shared with image configs are typed. Any other field is kept
/// in `extra`, so decoding and encoding a config does not lose data.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ConfigFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Index returned by the referrers API.
///
/// See <https://github.com/opencontainers/distribution-spec/blob/main/spec.md#listing-referrers>.
#[derive(serde::Deserialize, serde::Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub schema_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,

    #[serde(default)]
    pub manifests: Vec<Descriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: Annotations,
}
