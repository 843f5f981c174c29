use std::{borrow::Cow, fmt, str::FromStr};

/// Media type of a manifest, a config, or a layer.
///
/// Artifacts can use any media type, so this is a string wrapper. The
/// types defined by the OCI/Docker specifications are available as
/// associated constants.
///
/// # Examples
///
/// ```
/// # use oci_artifact::*;
/// let mt: MediaType = "application/vnd.oci.image.layer.v1.tar+gzip".parse().unwrap();
/// assert_eq!(mt, MediaType::OCI_LAYER_GZIP);
/// assert!(mt.is_known());
///
/// let custom = MediaType::new("application/vnd.example.sbom+json");
/// assert!(!custom.is_known());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MediaType(Cow<'static, str>);

/// Generate the associated constants for the known media types, and
/// the constant `ALL` with all of them.
macro_rules! media_types {
    ($($variant:ident = $mediatype:expr,)*) => {
        impl MediaType {
            $(
                #[doc = concat!("`", $mediatype, "`")]
                pub const $variant: MediaType = MediaType(Cow::Borrowed($mediatype));
            )*

            /// List with all known media types.
            pub(crate) const ALL: &[&str] = &[ $($mediatype),* ];
        }
    }
}

media_types!(
    DOCKER_CONFIG = "application/vnd.docker.container.image.v1+json",
    DOCKER_LAYER_GZIP = "application/vnd.docker.image.rootfs.diff.tar.gzip",
    DOCKER_MANIFEST_LIST = "application/vnd.docker.distribution.manifest.list.v2+json",
    DOCKER_MANIFEST = "application/vnd.docker.distribution.manifest.v2+json",
    OCI_CONFIG = "application/vnd.oci.image.config.v1+json",
    OCI_EMPTY = "application/vnd.oci.empty.v1+json",
    OCI_LAYER = "application/vnd.oci.image.layer.v1.tar",
    OCI_LAYER_GZIP = "application/vnd.oci.image.layer.v1.tar+gzip",
    OCI_LAYER_ZSTD = "application/vnd.oci.image.layer.v1.tar+zstd",
    OCI_INDEX = "application/vnd.oci.image.index.v1+json",
    OCI_MANIFEST = "application/vnd.oci.image.manifest.v1+json",
);

/// Error for empty media types.
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("Media type can't be empty.")]
pub struct InvalidMediaType;

/// Compression of the content described by a media type.
#[derive(Copy, Clone, PartialEq, Debug)]
pub(crate) enum Compression {
    None,
    Gzip,
    Zstd,
}

impl MediaType {
    /// Build a media type from any string.
    ///
    /// An empty string is replaced with `application/octet-stream`, since
    /// media types can't be empty.
    pub fn new(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            return MediaType(Cow::Borrowed("application/octet-stream"));
        }

        match Self::ALL.iter().find(|k| **k == s) {
            Some(known) => MediaType(Cow::Borrowed(*known)),
            None => MediaType(Cow::Owned(s)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return `true` if this is one of the media types defined by the
    /// OCI/Docker specifications.
    pub fn is_known(&self) -> bool {
        Self::ALL.contains(&self.as_str())
    }

    pub(crate) fn compression(&self) -> Compression {
        let s = self.as_str();
        if s.ends_with("+gzip") || s.ends_with(".tar.gzip") {
            Compression::Gzip
        } else if s.ends_with("+zstd") {
            Compression::Zstd
        } else {
            Compression::None
        }
    }
}

impl FromStr for MediaType {
    type Err = InvalidMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidMediaType);
        }

        Ok(MediaType::new(s))
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl serde::Serialize for MediaType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

struct MediaTypeVisitor;

impl<'de> serde::de::Visitor<'de> for MediaTypeVisitor {
    type Value = MediaType;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("Media type for OCI/Docker objects.")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        MediaType::from_str(v).map_err(E::custom)
    }
}

impl<'de> serde::Deserialize<'de> for MediaType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_str(MediaTypeVisitor)
    }
}

#[test]
fn media_type_in_json() {
    #[derive(serde::Deserialize, Debug)]
    struct Example {
        mt: MediaType,
    }

    let example: Example =
        serde_json::from_str(r#"{"mt": "application/vnd.oci.image.index.v1+json"}"#).unwrap();
    assert_eq!(example.mt, MediaType::OCI_INDEX);

    let example: Example = serde_json::from_str(r#"{"mt": "text/plain"}"#).unwrap();
    assert_eq!(example.mt.as_str(), "text/plain");

    assert!(serde_json::from_str::<Example>(r#"{"mt": ""}"#).is_err());
}

#[test]
fn compression_from_suffix() {
    assert_eq!(MediaType::OCI_LAYER.compression(), Compression::None);
    assert_eq!(MediaType::OCI_LAYER_GZIP.compression(), Compression::Gzip);
    assert_eq!(MediaType::DOCKER_LAYER_GZIP.compression(), Compression::Gzip);
    assert_eq!(MediaType::OCI_LAYER_ZSTD.compression(), Compression::Zstd);
}
