use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

use crate::{
    blob::Blob, manifest::Descriptor, partial, Artifact, ArtifactManifest, ConfigFile, Digest,
    Error, EventHandler, MediaType, Result,
};

use super::{Addendum, Overrides};

/// Artifact built from a base artifact, plus some blobs and fields
/// replaced by [`Mutate`](super::Mutate).
///
/// The manifest is computed on the first access to any derived value
/// (digest, size, manifest, or config). If more than one thread requests
/// these values at the same time, only one of them computes the manifest,
/// and the others wait for its result.
///
/// If an added blob can't report its digest yet (like a [`StreamBlob`]
/// whose stream is not consumed), all derived values return
/// [`Error::NotComputed`], and the computation can be retried later.
///
/// [`StreamBlob`]: crate::StreamBlob
pub struct ComposedArtifact {
    base: Arc<dyn Artifact>,
    adds: Vec<Addendum>,
    overrides: Overrides,
    event_handler: Arc<dyn EventHandler>,

    state: Mutex<State>,
    notifier: Condvar,

    /// Raw config from the base, fetched on first use.
    base_config: Mutex<Option<Arc<[u8]>>>,
}

enum State {
    NotComputed,
    Computing,
    Computed(Arc<Computed>),
}

/// Values derived from the base artifact and the changes.
struct Computed {
    manifest: ArtifactManifest,
    raw_manifest: Arc<[u8]>,
    digest: Digest,

    /// Added blobs, by digest.
    digest_map: HashMap<Digest, Arc<dyn Blob>>,

    /// Serialized config, if it was replaced.
    raw_config: Option<Arc<[u8]>>,
}

impl ComposedArtifact {
    pub(super) fn new(
        base: Arc<dyn Artifact>,
        adds: Vec<Addendum>,
        overrides: Overrides,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        ComposedArtifact {
            base,
            adds,
            overrides,
            event_handler,
            state: Mutex::new(State::NotComputed),
            notifier: Condvar::new(),
            base_config: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the computed values, computing them if needed.
    fn computed(&self) -> Result<Arc<Computed>> {
        let mut state = self.lock_state();

        // Wait if another thread is computing the values.
        loop {
            match &*state {
                State::Computed(computed) => return Ok(Arc::clone(computed)),
                State::NotComputed => break,
                State::Computing => (),
            }

            state = self
                .notifier
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        *state = State::Computing;
        drop(state);

        let guard = ComputingGuard(self);

        let computed = Arc::new(self.compute()?);
        *self.lock_state() = State::Computed(Arc::clone(&computed));
        drop(guard);

        // Handlers may read this artifact.
        self.event_handler
            .manifest_computed(&computed.digest, computed.raw_manifest.len());

        Ok(computed)
    }

    fn compute(&self) -> Result<Computed> {
        let base_manifest = self.base.manifest()?;

        // Nothing to change: reuse the bytes from the base.
        if self.adds.is_empty() && self.overrides.is_empty() {
            let raw_manifest = self.base.raw_manifest()?;
            return Ok(self.finish(base_manifest, raw_manifest, HashMap::new(), None));
        }

        let mut manifest = base_manifest;
        let mut digest_map = HashMap::with_capacity(self.adds.len());

        for add in &self.adds {
            let digest = add.blob.digest()?;

            let media_type = match &add.media_type {
                Some(mt) => mt.clone(),
                None => add.blob.media_type()?,
            };

            let mut descriptor = Descriptor::new(media_type, digest.clone(), add.blob.size()?);
            descriptor.annotations = add.annotations.clone();

            manifest.layers.push(descriptor);
            digest_map.insert(digest, Arc::clone(&add.blob));
        }

        let overrides = &self.overrides;

        if let Some(media_type) = &overrides.media_type {
            manifest.media_type = media_type.clone();
        }

        if let Some(artifact_type) = &overrides.artifact_type {
            manifest.artifact_type = Some(artifact_type.clone());
        }

        if let Some(annotations) = &overrides.annotations {
            manifest.annotations.extend(annotations.clone());
        }

        if let Some(subject) = &overrides.subject {
            manifest.subject = Some(subject.clone());
        }

        let raw_config = match &overrides.config_file {
            Some(config) => {
                let raw = config.to_bytes()?;

                let media_type = overrides
                    .config_media_type
                    .clone()
                    .or_else(|| manifest.config.take().map(|c| c.media_type))
                    .unwrap_or(MediaType::OCI_CONFIG);

                let digest = Digest::compute(&raw);
                manifest.config = Some(Descriptor::new(media_type, digest, raw.len() as i64));

                Some(Arc::from(raw))
            }

            None => {
                if let (Some(media_type), Some(config)) =
                    (&overrides.config_media_type, manifest.config.as_mut())
                {
                    config.media_type = media_type.clone();
                }

                None
            }
        };

        let raw_manifest = manifest.to_bytes()?;

        Ok(self.finish(manifest, raw_manifest.into(), digest_map, raw_config))
    }

    fn finish(
        &self,
        manifest: ArtifactManifest,
        raw_manifest: Arc<[u8]>,
        digest_map: HashMap<Digest, Arc<dyn Blob>>,
        raw_config: Option<Arc<[u8]>>,
    ) -> Computed {
        let digest = Digest::compute(&raw_manifest);

        tracing::debug!(
            %digest,
            size = raw_manifest.len(),
            layers = manifest.layers.len(),
            "manifest computed"
        );

        Computed {
            manifest,
            raw_manifest,
            digest,
            digest_map,
            raw_config,
        }
    }
}

/// Restore the `NotComputed` state if the computation does not
/// complete (for example, after an error or a `panic!`), and wake up
/// any waiting thread.
struct ComputingGuard<'a>(&'a ComposedArtifact);

impl Drop for ComputingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.lock_state();
        if matches!(*state, State::Computing) {
            *state = State::NotComputed;
        }

        self.0.notifier.notify_all();
    }
}

impl Artifact for ComposedArtifact {
    /// Blobs of the base, followed by the added blobs.
    ///
    /// It does not need the manifest, so it works even if the added blobs
    /// are not computed yet.
    fn blobs(&self) -> Result<Vec<Arc<dyn Blob>>> {
        let mut blobs = self.base.blobs()?;
        blobs.extend(self.adds.iter().map(|add| Arc::clone(&add.blob)));
        Ok(blobs)
    }

    fn media_type(&self) -> Result<MediaType> {
        match &self.overrides.media_type {
            Some(media_type) => Ok(media_type.clone()),
            None => self.base.media_type(),
        }
    }

    fn size(&self) -> Result<i64> {
        self.computed()?;
        partial::size(self)
    }

    fn config_name(&self) -> Result<Digest> {
        self.computed()?;
        partial::config_name(self)
    }

    fn config_file(&self) -> Result<ConfigFile> {
        self.computed()?;
        partial::config_file(self)
    }

    fn raw_config_file(&self) -> Result<Arc<[u8]>> {
        let computed = self.computed()?;

        if let Some(raw) = &computed.raw_config {
            return Ok(Arc::clone(raw));
        }

        let mut base_config = self
            .base_config
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(raw) = &*base_config {
            return Ok(Arc::clone(raw));
        }

        let raw = self.base.raw_config_file()?;

        if let Some(config) = &computed.manifest.config {
            self.event_handler.config_resolved(&config.digest);
        }

        *base_config = Some(Arc::clone(&raw));
        Ok(raw)
    }

    fn digest(&self) -> Result<Digest> {
        self.computed()?;
        partial::digest(self)
    }

    fn manifest(&self) -> Result<ArtifactManifest> {
        Ok(self.computed()?.manifest.clone())
    }

    fn raw_manifest(&self) -> Result<Arc<[u8]>> {
        Ok(Arc::clone(&self.computed()?.raw_manifest))
    }

    /// Find a blob in the config, the added blobs, and then in the base.
    fn blob_by_digest(&self, digest: &Digest) -> Result<Arc<dyn Blob>> {
        let computed = self.computed()?;

        if computed.manifest.config.as_ref().map(|c| &c.digest) == Some(digest) {
            return Ok(Arc::new(partial::config_layer(self)?));
        }

        if let Some(blob) = computed.digest_map.get(digest) {
            return Ok(Arc::clone(blob));
        }

        match self.base.blob_by_digest(digest) {
            Err(Error::NotFound(_)) => Err(Error::NotFound(digest.clone())),
            result => result,
        }
    }
}
