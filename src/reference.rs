//! Location of an artifact in a registry, like
//! `registry.example.com/foo/bar:1.0`.

use std::{borrow::Cow, fmt};

use crate::{Digest, DigestError};

/// Registry for names without a host, like `debian` or `nixos/nix`.
const DOCKER_HUB: &str = "registry-1.docker.io";

const LATEST: &str = "latest";

/// Errors from [`Reference::parse`].
#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Missing repository.")]
    MissingRepository,

    #[error("Empty tag.")]
    EmptyTag,

    #[error("{0}")]
    InvalidDigest(#[from] DigestError),
}

/// Reference to an artifact in an OCI registry.
///
/// Short names are expanded like `docker pull` does. The first component
/// is the registry only when it looks like a host (it contains a `.` or a
/// `:`, or it is `localhost`). Otherwise, the registry is Docker Hub, and
/// single-component names go to the `library/` namespace.
///
/// # Examples
///
/// ```
/// # use oci_artifact::*;
/// let reference = Reference::try_from("debian:stable").unwrap();
/// assert_eq!(reference.registry, "registry-1.docker.io");
/// assert_eq!(reference.repository, "library/debian");
/// assert_eq!(reference.tag, "stable");
///
/// let digest = Digest::compute(b"manifest");
/// let source = format!("127.0.0.1:5000/foo/bar@{digest}");
/// let reference = Reference::try_from(source.as_str()).unwrap();
/// assert_eq!(reference.registry, "127.0.0.1:5000");
/// assert_eq!(reference.tag, "latest");
/// assert_eq!(reference.manifest_path(), digest.to_string());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Reference<'a> {
    /// Host of the registry, with an optional port.
    pub registry: &'a str,

    /// Repository path, like `library/debian`.
    pub repository: Cow<'a, str>,

    pub tag: &'a str,

    /// Manifest digest, if present. It takes precedence over the tag.
    pub digest: Option<Digest>,
}

impl<'a> Reference<'a> {
    pub fn parse(input: &'a str) -> Result<Self, ParseError> {
        let (name, digest) = match input.rsplit_once('@') {
            Some((name, digest)) => (name, Some(Digest::parse(digest)?)),
            None => (input, None),
        };

        // Only a `:` in the last component starts the tag. Before that,
        // it separates the port of the registry.
        let last = name.rfind('/').map_or(0, |i| i + 1);
        let (name, tag) = match name[last..].find(':') {
            Some(i) => (&name[..last + i], &name[last + i + 1..]),
            None => (name, LATEST),
        };

        if tag.is_empty() {
            return Err(ParseError::EmptyTag);
        }

        let (registry, repository) = match name.split_once('/') {
            Some((host, path)) if is_host(host) => (host, Cow::Borrowed(path)),
            Some(_) => (DOCKER_HUB, Cow::Borrowed(name)),
            None if name.is_empty() => return Err(ParseError::MissingRepository),
            None => (DOCKER_HUB, Cow::Owned(format!("library/{name}"))),
        };

        if repository.is_empty() || repository.ends_with('/') {
            return Err(ParseError::MissingRepository);
        }

        Ok(Reference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Value to identify the manifest in registry requests: the digest,
    /// if present, or the tag.
    pub fn manifest_path(&self) -> String {
        match &self.digest {
            Some(digest) => digest.to_string(),
            None => self.tag.to_owned(),
        }
    }
}

fn is_host(component: &str) -> bool {
    component == "localhost" || component.contains(['.', ':'])
}

impl fmt::Display for Reference<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)?;

        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }

        Ok(())
    }
}

impl<'a> TryFrom<&'a str> for Reference<'a> {
    type Error = ParseError;

    fn try_from(input: &'a str) -> Result<Self, Self::Error> {
        Reference::parse(input)
    }
}
