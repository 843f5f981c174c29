use std::sync::Arc;

use crate::{
    blob::Blob, manifest::Descriptor, partial, ArtifactManifest, ConfigFile, Digest, Error,
    MediaType, Result,
};

/// Accessors for an OCI artifact: a manifest and the blobs it references.
///
/// Implementations must be safe to share between threads. Values returned
/// by these methods are independent copies, so callers can't modify the
/// state of the artifact.
pub trait Artifact: Send + Sync {
    /// Blobs of the artifact, in the same order as the layers of the manifest.
    fn blobs(&self) -> Result<Vec<Arc<dyn Blob>>>;

    /// Media type of the manifest.
    fn media_type(&self) -> Result<MediaType>;

    /// Length of the serialized manifest.
    fn size(&self) -> Result<i64>;

    /// Digest of the config blob.
    fn config_name(&self) -> Result<Digest>;

    fn config_file(&self) -> Result<ConfigFile>;

    /// Serialized bytes of [`config_file`](Self::config_file).
    fn raw_config_file(&self) -> Result<Arc<[u8]>>;

    /// Digest of the serialized manifest.
    fn digest(&self) -> Result<Digest>;

    fn manifest(&self) -> Result<ArtifactManifest>;

    /// Serialized bytes of [`manifest`](Self::manifest).
    fn raw_manifest(&self) -> Result<Arc<[u8]>>;

    /// Find a blob (including the config) by the digest of its
    /// compressed contents.
    fn blob_by_digest(&self, digest: &Digest) -> Result<Arc<dyn Blob>>;
}

/// Artifact with its manifest and config in memory.
pub struct MemoryArtifact {
    raw_manifest: Arc<[u8]>,
    manifest: ArtifactManifest,
    raw_config: Arc<[u8]>,
    blobs: Vec<Arc<dyn Blob>>,
}

impl MemoryArtifact {
    /// Build an artifact from a serialized manifest.
    ///
    /// `raw_manifest` is kept as is, so the digest of the artifact is the
    /// digest of these bytes.
    pub fn new(
        raw_manifest: impl Into<Vec<u8>>,
        raw_config: impl Into<Vec<u8>>,
        blobs: Vec<Arc<dyn Blob>>,
    ) -> Result<Self> {
        let raw_manifest: Arc<[u8]> = raw_manifest.into().into();
        let manifest = serde_json::from_slice(&raw_manifest)?;

        Ok(MemoryArtifact {
            raw_manifest,
            manifest,
            raw_config: raw_config.into().into(),
            blobs,
        })
    }

    /// Build an artifact with a manifest that references `blobs` as
    /// layers, and `config` as its config.
    pub fn from_parts(
        config_media_type: MediaType,
        config: &ConfigFile,
        blobs: Vec<Arc<dyn Blob>>,
    ) -> Result<Self> {
        let raw_config = config.to_bytes()?;

        let layers = blobs
            .iter()
            .map(|b| Ok(Descriptor::new(b.media_type()?, b.digest()?, b.size()?)))
            .collect::<Result<_>>()?;

        let manifest = ArtifactManifest {
            config: Some(Descriptor::new(
                config_media_type,
                Digest::compute(&raw_config),
                raw_config.len() as i64,
            )),
            layers,
            ..Default::default()
        };

        Ok(MemoryArtifact {
            raw_manifest: manifest.to_bytes()?.into(),
            manifest,
            raw_config: raw_config.into(),
            blobs,
        })
    }
}

impl Artifact for MemoryArtifact {
    fn blobs(&self) -> Result<Vec<Arc<dyn Blob>>> {
        Ok(self.blobs.clone())
    }

    fn media_type(&self) -> Result<MediaType> {
        Ok(self.manifest.media_type.clone())
    }

    fn size(&self) -> Result<i64> {
        partial::size(self)
    }

    fn config_name(&self) -> Result<Digest> {
        partial::config_name(self)
    }

    fn config_file(&self) -> Result<ConfigFile> {
        partial::config_file(self)
    }

    fn raw_config_file(&self) -> Result<Arc<[u8]>> {
        Ok(Arc::clone(&self.raw_config))
    }

    fn digest(&self) -> Result<Digest> {
        partial::digest(self)
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        Ok(self.manifest.clone())
    }

    fn raw_manifest(&self) -> Result<Arc<[u8]>> {
        Ok(Arc::clone(&self.raw_manifest))
    }

    fn blob_by_digest(&self, digest: &Digest) -> Result<Arc<dyn Blob>> {
        if self.manifest.config.as_ref().map(|c| &c.digest) == Some(digest) {
            return Ok(Arc::new(partial::config_layer(self)?));
        }

        self.blobs
            .iter()
            .find(|b| b.digest().ok().as_ref() == Some(digest))
            .cloned()
            .ok_or_else(|| Error::NotFound(digest.clone()))
    }
}

/// Artifact with no layers, and an empty JSON object as its config.
///
/// It is the base to build new artifacts.
pub fn empty() -> MemoryArtifact {
    let raw_config: Arc<[u8]> = Arc::from(&b"{}"[..]);

    let manifest = ArtifactManifest {
        config: Some(Descriptor::new(
            MediaType::OCI_EMPTY,
            Digest::compute(&raw_config),
            raw_config.len() as i64,
        )),
        ..Default::default()
    };

    // Only strings and integers, so serialization can't fail.
    let raw_manifest = manifest.to_bytes().unwrap_or_default();
    debug_assert!(!raw_manifest.is_empty());

    MemoryArtifact {
        raw_manifest: raw_manifest.into(),
        manifest,
        raw_config,
        blobs: Vec::new(),
    }
}
