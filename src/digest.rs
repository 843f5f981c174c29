use std::{
    fmt,
    io::{self, Read},
    str::FromStr,
};

use sha2::Digest as _;

use crate::hex;

/// Algorithm to compute the hash value.
///
/// See [`Digest`] for an example.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum DigestAlgorithm {
    SHA256,
    SHA512,
}

impl DigestAlgorithm {
    /// Name used as prefix in the string form of a digest.
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::SHA256 => "sha256",
            DigestAlgorithm::SHA512 => "sha512",
        }
    }

    /// Length of the hash value, in hexadecimal digits.
    fn hex_len(&self) -> usize {
        match self {
            DigestAlgorithm::SHA256 => 256 / 8 * 2,
            DigestAlgorithm::SHA512 => 512 / 8 * 2,
        }
    }
}

/// Content identifier of a blob or a manifest.
///
/// It contains the algorithm (like `SHA256`) and the hash value as a
/// lowercase hexadecimal string. Two digests are equal when both parts
/// are equal, so it can be used as a key in a `HashMap`.
///
/// # Examples
///
/// ```
/// # use oci_artifact::*;
/// const DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
///
/// let digest = Digest::parse(&format!("sha256:{}", DIGEST)).unwrap();
/// assert_eq!(digest.algorithm(), DigestAlgorithm::SHA256);
/// assert_eq!(digest.hash_value(), DIGEST);
/// assert_eq!(digest, Digest::compute(b"abc"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Deserialize, serde::Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    algorithm: DigestAlgorithm,
    hex: String,
}

/// Errors from the digest parser.
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DigestError {
    #[error("Invalid digest algorithm.")]
    InvalidAlgorithm,

    #[error("Invalid digest value.")]
    InvalidValue,
}

impl Digest {
    /// Compute the SHA256 digest of `data`.
    ///
    /// The bytes are hashed as they are, without any normalization.
    pub fn compute(data: impl AsRef<[u8]>) -> Digest {
        Self::compute_with(DigestAlgorithm::SHA256, data)
    }

    /// Compute the digest of `data` with a specific algorithm.
    pub fn compute_with(algorithm: DigestAlgorithm, data: impl AsRef<[u8]>) -> Digest {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(data.as_ref());
        hasher.finish()
    }

    /// Parse a string like `sha256:abcd...`.
    pub fn parse(s: &str) -> Result<Digest, DigestError> {
        let (algorithm, value) = match s.split_once(':') {
            Some(("sha256", v)) => (DigestAlgorithm::SHA256, v),
            Some(("sha512", v)) => (DigestAlgorithm::SHA512, v),
            _ => return Err(DigestError::InvalidAlgorithm),
        };

        // The hash value must have the expected length, and only contain
        // lowercase hexadecimal digits.
        let valid_digit = |c: char| c.is_ascii_digit() || ('a'..='f').contains(&c);
        if value.len() == algorithm.hex_len() && value.chars().all(valid_digit) {
            Ok(Digest {
                algorithm,
                hex: value.to_owned(),
            })
        } else {
            Err(DigestError::InvalidValue)
        }
    }

    pub fn hash_value(&self) -> &str {
        &self.hex
    }

    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Return a `Read` instance to compute its digest.
    ///
    /// When all data from `reader` is consumed, it verifies that the
    /// computed digest is the expected one. If not, it returns an
    /// [`InvalidData`](::std::io::ErrorKind::InvalidData)
    /// error.
    pub fn wrap_reader<R: Read>(&self, reader: R) -> impl Read {
        DigestReader {
            hasher: Hasher::new(self.algorithm),
            expected: self.clone(),
            reader,
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm.as_str(), self.hex)
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::parse(s)
    }
}

impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Digest::parse(&s)
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> String {
        digest.to_string()
    }
}

/// Incremental digest computation.
pub(crate) struct Hasher {
    algorithm: DigestAlgorithm,
    inner: Box<dyn digest::DynDigest + Send>,
}

impl Hasher {
    pub(crate) fn new(algorithm: DigestAlgorithm) -> Self {
        let inner: Box<dyn digest::DynDigest + Send> = match algorithm {
            DigestAlgorithm::SHA256 => Box::new(sha2::Sha256::new()),
            DigestAlgorithm::SHA512 => Box::new(sha2::Sha512::new()),
        };

        Hasher { algorithm, inner }
    }

    pub(crate) fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Return the digest of the data received so far, and reset
    /// the internal state.
    pub(crate) fn finish(&mut self) -> Digest {
        const MAX_DIGEST_SIZE: usize = 512 / 8;

        let mut buffer = [0u8; MAX_DIGEST_SIZE];
        let out = &mut buffer[..self.inner.output_size()];

        // The buffer always has the size requested by the hasher.
        let _ = self.inner.finalize_into_reset(out);

        Digest {
            algorithm: self.algorithm,
            hex: hex::encode(out),
        }
    }
}

struct DigestReader<R> {
    hasher: Hasher,
    expected: Digest,
    reader: R,
}

impl<R: Read> Read for DigestReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let buf_len = buf.len();
        let n = self.reader.read(buf)?;

        if n == 0 && buf_len > 0 {
            // On EOF, compare the computed digest with the expected one.
            return self.check_hash();
        }

        self.hasher.update(&buf[..n]);

        Ok(n)
    }
}

impl<R> DigestReader<R> {
    fn check_hash(&mut self) -> io::Result<usize> {
        let computed = self.hasher.finish();

        if computed != self.expected {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid digest. Expected {}, got {}.", self.expected, computed),
            ));
        }

        Ok(0)
    }
}
