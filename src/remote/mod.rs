//! Artifacts fetched from an OCI registry.
//!
//! Only the manifest is downloaded by [`fetch`]. Blobs, including the
//! config, are downloaded when they are read.

mod http;


use std::{
    io::{self, Read},
    sync::{Arc, Mutex, PoisonError},
};

use crate::{
    blob::{decompress, Blob, BlobReader},
    manifest::{Descriptor, Index},
    partial, Artifact, ArtifactManifest, ConfigFile, Digest, Error, EventHandler, MediaType,
    Reference, Result,
};

pub use http::HttpError;

use http::Client;

/// Artifact backed by a registry.
pub struct RemoteArtifact {
    client: Arc<Client>,
    media_type: MediaType,
    raw_manifest: Arc<[u8]>,
    manifest: ArtifactManifest,
    raw_config: Mutex<Option<Arc<[u8]>>>,
}

/// Download the manifest of the artifact in `reference`.
///
/// If `reference` contains a digest (like `@sha256:...`), the manifest
/// must match it.
#[tracing::instrument(skip_all, fields(reference = %reference))]
pub fn fetch(reference: &Reference, event_handler: impl EventHandler) -> Result<RemoteArtifact> {
    let client = Client::new(reference, Arc::new(event_handler));

    let (media_type, raw_manifest) = client.get_document(
        &format!("manifests/{}", reference.manifest_path()),
        &[MediaType::OCI_MANIFEST, MediaType::DOCKER_MANIFEST],
        reference.digest.as_ref(),
    )?;

    let manifest = serde_json::from_slice(&raw_manifest)?;

    tracing::debug!(%media_type, size = raw_manifest.len(), "manifest downloaded");

    Ok(RemoteArtifact {
        client: Arc::new(client),
        media_type,
        raw_manifest: raw_manifest.into(),
        manifest,
        raw_config: Mutex::new(None),
    })
}

/// Response from the referrers API.
pub struct Referrers {
    /// Body of the response, as it was received.
    pub raw: Vec<u8>,

    pub index: Index,
}

/// Get the index of artifacts whose `subject` is `digest`, in the
/// repository of `reference`.
#[tracing::instrument(skip_all, fields(reference = %reference, digest = %digest))]
pub fn referrers(
    reference: &Reference,
    digest: &Digest,
    event_handler: impl EventHandler,
) -> Result<Referrers> {
    let client = Client::new(reference, Arc::new(event_handler));

    let (_, raw) = client.get_document(
        &format!("referrers/{digest}"),
        &[MediaType::OCI_INDEX],
        None,
    )?;

    let index = serde_json::from_slice(&raw)?;

    Ok(Referrers { raw, index })
}

impl RemoteArtifact {
    fn blob(&self, descriptor: &Descriptor) -> Arc<dyn Blob> {
        Arc::new(RemoteBlob {
            client: Arc::clone(&self.client),
            descriptor: descriptor.clone(),
        })
    }
}

impl Artifact for RemoteArtifact {
    fn blobs(&self) -> Result<Vec<Arc<dyn Blob>>> {
        Ok(self.manifest.layers.iter().map(|l| self.blob(l)).collect())
    }

    fn media_type(&self) -> Result<MediaType> {
        Ok(self.media_type.clone())
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
        let mut raw_config = self
            .raw_config
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(raw) = &*raw_config {
            return Ok(Arc::clone(raw));
        }

        let config = self.manifest.config.as_ref().ok_or(Error::MissingConfig)?;

        let mut data = Vec::new();
        self.blob(config)
            .compressed()?
            .read_to_end(&mut data)
            .map_err(Error::unavailable)?;

        self.client.event_handler().config_resolved(&config.digest);

        let raw: Arc<[u8]> = data.into();
        *raw_config = Some(Arc::clone(&raw));
        Ok(raw)
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

        self.manifest
            .layers
            .iter()
            .find(|l| &l.digest == digest)
            .map(|l| self.blob(l))
            .ok_or_else(|| Error::NotFound(digest.clone()))
    }
}

/// Blob downloaded from the registry on every read.
struct RemoteBlob {
    client: Arc<Client>,
    descriptor: Descriptor,
}

impl Blob for RemoteBlob {
    fn digest(&self) -> Result<Digest> {
        Ok(self.descriptor.digest.clone())
    }

    fn compressed(&self) -> Result<BlobReader> {
        match self.client.download_blob(&self.descriptor.digest) {
            Ok(reader) => Ok(Box::new(reader)),
            Err(e) => Err(Error::unavailable(io::Error::other(e))),
        }
    }

    fn uncompressed(&self) -> Result<BlobReader> {
        decompress(&self.descriptor.media_type, self.compressed()?)
    }

    fn size(&self) -> Result<i64> {
        Ok(self.descriptor.size)
    }

    fn media_type(&self) -> Result<MediaType> {
        Ok(self.descriptor.media_type.clone())
    }
}
