//! Values derived from the raw manifest and raw config of any [`Artifact`].
//!
//! These functions only depend on [`Artifact::raw_manifest`],
//! [`Artifact::manifest`], and [`Artifact::raw_config_file`], so they are
//! shared by every implementation of the trait.

use crate::{blob::ConfigBlob, manifest::Descriptor, Artifact, ConfigFile, Digest, Error, Result};

/// Digest of the serialized manifest.
pub fn digest<A: Artifact + ?Sized>(artifact: &A) -> Result<Digest> {
    Ok(Digest::compute(artifact.raw_manifest()?))
}

/// Length of the serialized manifest.
pub fn size<A: Artifact + ?Sized>(artifact: &A) -> Result<i64> {
    Ok(artifact.raw_manifest()?.len() as i64)
}

/// Digest of the config, as recorded in the manifest.
///
/// The config blob is not downloaded.
pub fn config_name<A: Artifact + ?Sized>(artifact: &A) -> Result<Digest> {
    artifact
        .manifest()?
        .config
        .map(|c| c.digest)
        .ok_or(Error::MissingConfig)
}

/// Blob to read the raw config of the artifact.
pub fn config_layer<A: Artifact + ?Sized>(artifact: &A) -> Result<ConfigBlob> {
    let config = artifact.manifest()?.config.ok_or(Error::MissingConfig)?;

    Ok(ConfigBlob {
        raw: artifact.raw_config_file()?,
        digest: config.digest,
        media_type: config.media_type,
    })
}

/// Decode the raw config of the artifact.
pub fn config_file<A: Artifact + ?Sized>(artifact: &A) -> Result<ConfigFile> {
    Ok(serde_json::from_slice(&artifact.raw_config_file()?)?)
}

/// Descriptor to reference the artifact from another manifest, like the
/// `subject` field of a referrer.
pub fn descriptor<A: Artifact + ?Sized>(artifact: &A) -> Result<Descriptor> {
    let raw = artifact.raw_manifest()?;

    Ok(Descriptor::new(
        artifact.media_type()?,
        Digest::compute(&raw),
        raw.len() as i64,
    ))
}
