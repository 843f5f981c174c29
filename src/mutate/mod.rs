//! Derive new artifacts from existing ones.
//!
//! The base artifact is never modified. [`Mutate`] collects the blobs to
//! append and the fields to replace, and returns a [`ComposedArtifact`]
//! that computes its manifest the first time it is needed.
//!
//! # Examples
//!
//! ```
//! # use std::sync::Arc;
//! # use oci_artifact::*;
//! let base = Arc::new(artifact::empty());
//! let sbom = StaticBlob::new(&b"{}"[..], MediaType::new("application/spdx+json"));
//!
//! let artifact = Mutate::new(base.clone())
//!     .append(Addendum::new(Arc::new(sbom)).annotation("org.example.kind", "sbom"))
//!     .artifact_type(MediaType::new("application/vnd.example.sbom"))
//!     .build();
//!
//! let manifest = artifact.manifest().unwrap();
//! assert_eq!(manifest.layers.len(), 1);
//! assert_ne!(artifact.digest().unwrap(), base.digest().unwrap());
//! ```

mod artifact;


use std::sync::Arc;

use crate::{
    artifact::empty,
    blob::{Blob, StaticBlob},
    event_handler::NoEventHandler,
    manifest::{Annotations, Descriptor},
    partial, Artifact, ConfigFile, EventHandler, MediaType, Result,
};

pub use artifact::ComposedArtifact;

/// Blob to append to an artifact.
///
/// `media_type` and `annotations` are copied to the descriptor of the
/// blob in the new manifest. If `media_type` is `None`, the value from
/// [`Blob::media_type`] is used.
#[derive(Clone)]
pub struct Addendum {
    pub blob: Arc<dyn Blob>,
    pub media_type: Option<MediaType>,
    pub annotations: Annotations,
}

impl Addendum {
    pub fn new(blob: Arc<dyn Blob>) -> Self {
        Addendum {
            blob,
            media_type: None,
            annotations: Default::default(),
        }
    }

    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// Fields of the manifest replaced in the new artifact.
#[derive(Clone, Default)]
pub(crate) struct Overrides {
    pub media_type: Option<MediaType>,
    pub artifact_type: Option<MediaType>,
    pub annotations: Option<Annotations>,
    pub subject: Option<Descriptor>,
    pub config_file: Option<ConfigFile>,
    pub config_media_type: Option<MediaType>,
}

impl Overrides {
    fn is_empty(&self) -> bool {
        self.media_type.is_none()
            && self.artifact_type.is_none()
            && self.annotations.is_none()
            && self.subject.is_none()
            && self.config_file.is_none()
            && self.config_media_type.is_none()
    }
}

/// Builder for a [`ComposedArtifact`].
pub struct Mutate {
    base: Arc<dyn Artifact>,
    adds: Vec<Addendum>,
    overrides: Overrides,
    event_handler: Arc<dyn EventHandler>,
}

impl Mutate {
    pub fn new(base: Arc<dyn Artifact>) -> Self {
        Mutate {
            base,
            adds: Vec::new(),
            overrides: Default::default(),
            event_handler: Arc::new(NoEventHandler),
        }
    }

    /// Append a blob. Blobs are added to the manifest after the layers
    /// of the base, in the same order as the calls to this method.
    pub fn append(mut self, addendum: Addendum) -> Self {
        self.adds.push(addendum);
        self
    }

    /// Media type of the manifest.
    pub fn media_type(mut self, media_type: MediaType) -> Self {
        self.overrides.media_type = Some(media_type);
        self
    }

    pub fn artifact_type(mut self, artifact_type: MediaType) -> Self {
        self.overrides.artifact_type = Some(artifact_type);
        self
    }

    /// Annotations of the manifest.
    ///
    /// They are merged with the annotations of the base. On conflicts,
    /// values in `annotations` are used.
    pub fn annotations(mut self, annotations: Annotations) -> Self {
        self.overrides.annotations = Some(annotations);
        self
    }

    pub fn subject(mut self, subject: Descriptor) -> Self {
        self.overrides.subject = Some(subject);
        self
    }

    /// Replace the config of the artifact.
    pub fn config_file(mut self, config: ConfigFile) -> Self {
        self.overrides.config_file = Some(config);
        self
    }

    /// Media type in the config descriptor.
    pub fn config_media_type(mut self, media_type: MediaType) -> Self {
        self.overrides.config_media_type = Some(media_type);
        self
    }

    pub fn event_handler(mut self, event_handler: impl EventHandler) -> Self {
        self.event_handler = Arc::new(event_handler);
        self
    }

    pub fn build(self) -> ComposedArtifact {
        ComposedArtifact::new(self.base, self.adds, self.overrides, self.event_handler)
    }
}

/// Build the artifact to attach `data` to `subject`.
///
/// The new artifact contains a single layer with `data`, and its config
/// descriptor uses `artifact_type` as its media type. Usual values for
/// the types are [`MediaType::OCI_CONFIG`] and [`MediaType::OCI_LAYER`].
pub fn attach(
    subject: &dyn Artifact,
    data: impl Into<Vec<u8>>,
    artifact_type: MediaType,
    media_type: MediaType,
) -> Result<ComposedArtifact> {
    let layer = StaticBlob::new(data, media_type);

    Ok(Mutate::new(Arc::new(empty()))
        .append(Addendum::new(Arc::new(layer)))
        .config_media_type(artifact_type)
        .subject(partial::descriptor(subject)?)
        .build())
}
