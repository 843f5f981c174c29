use std::{cell::RefCell, io::Write, path::Path, rc::Rc, sync::Arc};

use flate2::write::GzEncoder;
use oci_artifact::{Descriptor, Digest, MediaType, StaticBlob};

/// Blob data, with its digest computed in the test.
#[derive(Debug, Clone)]
pub struct TestBlob {
    pub media_type: MediaType,
    pub digest: Digest,
    pub data: Vec<u8>,
}

impl TestBlob {
    pub fn new(media_type: MediaType, data: impl Into<Vec<u8>>) -> TestBlob {
        let data = data.into();

        TestBlob {
            media_type,
            digest: Digest::compute(&data),
            data,
        }
    }

    /// Return a builder to create an archive.
    pub fn archive(media_type: MediaType) -> BlobArchive {
        let buffer = SharedBuffer(Rc::new(Vec::with_capacity(4096).into()));

        let stream: Box<dyn Write> = match media_type.as_str() {
            "application/vnd.oci.image.layer.v1.tar+gzip" => {
                Box::new(GzEncoder::new(buffer.clone(), Default::default()))
            }

            #[cfg(feature = "zstd")]
            "application/vnd.oci.image.layer.v1.tar+zstd" => Box::new(
                zstd::stream::write::Encoder::new(buffer.clone(), 0)
                    .unwrap()
                    .auto_finish(),
            ),

            _ => Box::new(buffer.clone()),
        };

        BlobArchive::new(media_type, buffer, stream)
    }

    pub fn descriptor(&self) -> Descriptor {
        Descriptor::new(
            self.media_type.clone(),
            self.digest.clone(),
            self.data.len() as i64,
        )
    }

    pub fn to_blob(&self) -> Arc<dyn oci_artifact::Blob> {
        Arc::new(StaticBlob::new(self.data.clone(), self.media_type.clone()))
    }
}

pub struct BlobArchive {
    media_type: MediaType,
    buffer: SharedBuffer,
    archive: tar::Builder<Box<dyn Write>>,
}

#[derive(Clone)]
struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl BlobArchive {
    fn new(media_type: MediaType, buffer: SharedBuffer, stream: Box<dyn Write>) -> Self {
        BlobArchive {
            media_type,
            buffer,
            archive: tar::Builder::new(stream),
        }
    }

    pub fn build(mut self) -> TestBlob {
        self.archive.finish().unwrap();
        drop(self.archive.into_inner().unwrap());

        TestBlob::new(self.media_type, self.buffer.0.take())
    }

    pub fn regular(mut self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> Self {
        let data = data.as_ref();
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::file());
        header.set_size(data.len() as u64);
        header.set_cksum();
        self.archive.append(&header, data).unwrap();
        self
    }
}

/// Read the names and contents of the files in an uncompressed tar
/// archive.
pub fn tar_entries(data: impl std::io::Read) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(data);
    archive
        .entries()
        .unwrap()
        .map(|entry| {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().into_owned();

            let mut contents = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut contents).unwrap();
            (path, contents)
        })
        .collect()
}
