use crate::Digest;

/// Handler to receive notifications for events while artifacts are
/// fetched and composed.
///
/// All methods are optional.
#[expect(unused_variables)]
pub trait EventHandler: Send + Sync + 'static {
    /// HTTP request to the registry.
    fn registry_request(&self, url: &str) {}

    /// Registry requires an [authentication token][token].
    ///
    /// [token]: https://distribution.github.io/distribution/spec/auth/token/
    fn registry_auth(&self, url: &str) {}

    /// The manifest of a composed artifact has been serialized.
    ///
    /// It is invoked once per artifact, regardless of how many callers
    /// request its derived values.
    fn manifest_computed(&self, digest: &Digest, size: usize) {}

    /// The config of an artifact has been decoded.
    fn config_resolved(&self, digest: &Digest) {}
}

/// [`EventHandler`] instance to ignore all events.
pub struct NoEventHandler;

impl EventHandler for NoEventHandler {}
