//! Content units of an artifact.
//!
//! A [`Blob`] is identified by the digest of its compressed bytes. Every
//! call to [`Blob::compressed`] or [`Blob::uncompressed`] returns a new
//! reader, which is released when it is dropped.

use std::{
    io::{self, Cursor, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, OnceLock, PoisonError,
    },
};

use crate::{
    digest::{DigestAlgorithm, Hasher},
    mediatype::Compression,
    Digest, Error, MediaType, Result,
};

/// Reader returned by the blob accessors.
pub type BlobReader = Box<dyn Read + Send>;

/// Accessors for a single blob of an artifact.
pub trait Blob: Send + Sync {
    /// Digest of the compressed contents.
    fn digest(&self) -> Result<Digest>;

    /// Reader for the compressed contents.
    fn compressed(&self) -> Result<BlobReader>;

    /// Reader for the uncompressed contents.
    fn uncompressed(&self) -> Result<BlobReader>;

    /// Length, in bytes, of the compressed contents.
    fn size(&self) -> Result<i64>;

    fn media_type(&self) -> Result<MediaType>;
}

/// Read the compressed contents of `blob`.
pub fn read_compressed(blob: &dyn Blob) -> Result<Vec<u8>> {
    let mut reader = blob.compressed()?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data).map_err(Error::unavailable)?;
    Ok(data)
}

/// Wrap `reader` with a decoder for the compression of `media_type`.
pub(crate) fn decompress(media_type: &MediaType, reader: BlobReader) -> Result<BlobReader> {
    match media_type.compression() {
        Compression::None => Ok(reader),

        Compression::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),

        #[cfg(feature = "zstd")]
        Compression::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(reader).map_err(Error::unavailable)?;
            Ok(Box::new(decoder))
        }

        #[cfg(not(feature = "zstd"))]
        Compression::Zstd => Err(Error::unavailable(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("No decoder for {media_type}"),
        ))),
    }
}

/// Blob with its contents in memory.
///
/// It is used for files added to an artifact, like the attachments of
/// the `attach` command.
#[derive(Clone, Debug)]
pub struct StaticBlob {
    data: Arc<[u8]>,
    digest: Digest,
    media_type: MediaType,
}

impl StaticBlob {
    pub fn new(data: impl Into<Vec<u8>>, media_type: MediaType) -> Self {
        let data: Arc<[u8]> = data.into().into();
        let digest = Digest::compute(&data);

        StaticBlob {
            data,
            digest,
            media_type,
        }
    }
}

impl Blob for StaticBlob {
    fn digest(&self) -> Result<Digest> {
        Ok(self.digest.clone())
    }

    fn compressed(&self) -> Result<BlobReader> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.data))))
    }

    fn uncompressed(&self) -> Result<BlobReader> {
        decompress(&self.media_type, self.compressed()?)
    }

    fn size(&self) -> Result<i64> {
        Ok(self.data.len() as i64)
    }

    fn media_type(&self) -> Result<MediaType> {
        Ok(self.media_type.clone())
    }
}

/// Synthetic blob for the config of an artifact.
///
/// Both readers return the same bytes.
#[derive(Clone, Debug)]
pub struct ConfigBlob {
    pub(crate) raw: Arc<[u8]>,
    pub(crate) digest: Digest,
    pub(crate) media_type: MediaType,
}

impl Blob for ConfigBlob {
    fn digest(&self) -> Result<Digest> {
        Ok(self.digest.clone())
    }

    fn compressed(&self) -> Result<BlobReader> {
        Ok(Box::new(Cursor::new(Arc::clone(&self.raw))))
    }

    fn uncompressed(&self) -> Result<BlobReader> {
        self.compressed()
    }

    fn size(&self) -> Result<i64> {
        Ok(self.raw.len() as i64)
    }

    fn media_type(&self) -> Result<MediaType> {
        Ok(self.media_type.clone())
    }
}

/// Values of a [`StreamBlob`] available after its stream is consumed.
#[derive(Clone, Debug)]
struct StreamDigests {
    digest: Digest,
    diff_id: Digest,
    size: i64,
}

/// Blob built from a stream of uncompressed data.
///
/// The stream can be read only once. The compressed reader applies gzip
/// on the fly, and the digest and size of the blob are known only after
/// that reader reaches EOF. Until then, [`Blob::digest`] and
/// [`Blob::size`] return [`Error::NotComputed`].
///
/// If the digests can't be computed anymore, because the stream was
/// consumed through [`Blob::uncompressed`], the compressed reader failed,
/// or it was dropped before EOF, these methods return
/// [`Error::BlobUnavailable`].
pub struct StreamBlob {
    media_type: MediaType,
    source: Mutex<Option<BlobReader>>,
    digests: Arc<OnceLock<StreamDigests>>,
    lost: Arc<AtomicBool>,
}

impl StreamBlob {
    pub fn new(source: impl Read + Send + 'static) -> Self {
        StreamBlob {
            media_type: MediaType::OCI_LAYER_GZIP,
            source: Mutex::new(Some(Box::new(source))),
            digests: Default::default(),
            lost: Default::default(),
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    /// Digest of the uncompressed contents.
    pub fn diff_id(&self) -> Result<Digest> {
        self.computed().map(|d| d.diff_id.clone())
    }

    fn computed(&self) -> Result<&StreamDigests> {
        match self.digests.get() {
            Some(digests) => Ok(digests),
            None if self.lost.load(Ordering::Acquire) => Err(Error::unavailable(
                io::Error::other("Stream consumed before computing its digest."),
            )),
            None => Err(Error::NotComputed),
        }
    }

    fn take_source(&self) -> Result<BlobReader> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::unavailable(io::Error::other("Stream already consumed.")))
    }
}

impl Blob for StreamBlob {
    fn digest(&self) -> Result<Digest> {
        self.computed().map(|d| d.digest.clone())
    }

    fn compressed(&self) -> Result<BlobReader> {
        let uncompressed = HashingReader {
            hasher: Hasher::new(DigestAlgorithm::SHA256),
            reader: self.take_source()?,
        };

        Ok(Box::new(CompressingReader {
            encoder: flate2::read::GzEncoder::new(uncompressed, Default::default()),
            hasher: Hasher::new(DigestAlgorithm::SHA256),
            size: 0,
            digests: Arc::clone(&self.digests),
            lost: Arc::clone(&self.lost),
        }))
    }

    fn uncompressed(&self) -> Result<BlobReader> {
        let source = self.take_source()?;
        self.lost.store(true, Ordering::Release);
        Ok(source)
    }

    fn size(&self) -> Result<i64> {
        self.computed().map(|d| d.size)
    }

    fn media_type(&self) -> Result<MediaType> {
        Ok(self.media_type.clone())
    }
}

/// Compute the digest of the data read from `reader`.
struct HashingReader<R> {
    hasher: Hasher,
    reader: R,
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }
}

/// Compress a stream, and store its digests when EOF is reached.
struct CompressingReader {
    encoder: flate2::read::GzEncoder<HashingReader<BlobReader>>,
    hasher: Hasher,
    size: i64,
    digests: Arc<OnceLock<StreamDigests>>,
    lost: Arc<AtomicBool>,
}

impl Read for CompressingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = match self.encoder.read(buf) {
            Ok(n) => n,
            Err(e) => {
                self.lost.store(true, Ordering::Release);
                return Err(e);
            }
        };

        if n == 0 && !buf.is_empty() {
            if self.digests.get().is_none() {
                let diff_id = self.encoder.get_mut().hasher.finish();
                let digest = self.hasher.finish();

                tracing::debug!(%digest, %diff_id, size = self.size, "stream blob finalized");

                let _ = self.digests.set(StreamDigests {
                    digest,
                    diff_id,
                    size: self.size,
                });
            }

            return Ok(0);
        }

        self.hasher.update(&buf[..n]);
        self.size += n as i64;

        Ok(n)
    }
}

impl Drop for CompressingReader {
    fn drop(&mut self) {
        if self.digests.get().is_none() {
            self.lost.store(true, Ordering::Release);
        }
    }
}
