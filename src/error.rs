use std::io;

use crate::{digest::DigestError, reference::ParseError, remote::HttpError, Digest};

/// Errors from artifacts and blobs.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid digest: {0}")]
    MalformedDigest(#[from] DigestError),

    /// A value depends on a stream that has not been consumed yet.
    ///
    /// It is not fatal: the operation can be retried after reading
    /// the stream to completion.
    #[error("Value not computed until the stream is consumed.")]
    NotComputed,

    #[error("Blob unavailable: {0}")]
    BlobUnavailable(#[source] io::Error),

    #[error("Blob not found: {0}")]
    NotFound(Digest),

    #[error("Invalid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] HttpError),

    #[error("Invalid reference: {0}")]
    InvalidReference(#[from] ParseError),

    #[error("Manifest has no config.")]
    MissingConfig,
}

impl Error {
    /// Wrap an error from a blob stream.
    pub(crate) fn unavailable(e: impl Into<io::Error>) -> Self {
        Error::BlobUnavailable(e.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
