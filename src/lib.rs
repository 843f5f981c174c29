//! Model OCI artifacts as immutable values, and derive new artifacts
//! from existing ones.

mod digest;
mod error;
mod event_handler;
mod hex;
mod mediatype;

pub mod artifact;
pub mod blob;
pub mod manifest;
pub mod mutate;
pub mod partial;
pub mod reference;
pub mod remote;

pub use artifact::{Artifact, MemoryArtifact};
pub use blob::{Blob, StaticBlob, StreamBlob};
pub use self::digest::{Digest, DigestAlgorithm, DigestError};
pub use error::{Error, Result};
pub use event_handler::{EventHandler, NoEventHandler};
pub use manifest::{ArtifactManifest, ConfigFile, Descriptor};
pub use mediatype::{InvalidMediaType, MediaType};
pub use mutate::{Addendum, ComposedArtifact, Mutate};
pub use reference::Reference;
