//! Pass-through hashing for upload streams.
//!
//! `HashingReader` feeds every byte handed to its consumer into a running
//! SHA-256 state, so the digest certifies exactly what was transmitted.

use crate::{Result, StorageError};
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
}

impl DigestAlgorithm {
    pub const fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = StorageError;

    fn from_str(identifier: &str) -> Result<Self> {
        match identifier.trim().to_ascii_uppercase().as_str() {
            "SHA-256" | "SHA256" => Ok(DigestAlgorithm::Sha256),
            other => Err(StorageError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Digest over the bytes that passed through a `HashingReader`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    pub algorithm: DigestAlgorithm,
    pub bytes: Vec<u8>,
    pub length: u64,
}

impl ContentDigest {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

pub struct HashingReader<R> {
    inner: Option<R>,
    hasher: Sha256,
    algorithm: DigestAlgorithm,
    bytes_read: u64,
    exhausted: bool,
}

impl<R> HashingReader<R> {
    pub fn new(inner: R, algorithm: &str) -> Result<Self> {
        let algorithm = algorithm.parse::<DigestAlgorithm>()?;
        Ok(Self::with_algorithm(inner, algorithm))
    }

    pub fn sha256(inner: R) -> Self {
        Self::with_algorithm(inner, DigestAlgorithm::Sha256)
    }

    fn with_algorithm(inner: R, algorithm: DigestAlgorithm) -> Self {
        Self {
            inner: Some(inner),
            hasher: Sha256::new(),
            algorithm,
            bytes_read: 0,
            exhausted: false,
        }
    }

    /// Digest over everything read so far.
    ///
    /// Final only once `is_exhausted()` is true; before that it covers a
    /// prefix of the stream.
    pub fn signature(&self) -> ContentDigest {
        ContentDigest {
            algorithm: self.algorithm,
            bytes: self.hasher.clone().finalize().to_vec(),
            length: self.bytes_read,
        }
    }

    /// True once a read has observed end-of-stream.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Releases the inner stream. Subsequent calls do nothing.
    pub fn close(&mut self) {
        if let Some(inner) = self.inner.take() {
            drop(inner);
        }
    }

    fn absorb(&mut self, chunk: &[u8], requested: bool) {
        if chunk.is_empty() {
            if requested {
                self.exhausted = true;
            }
            return;
        }
        self.hasher.update(chunk);
        self.bytes_read += chunk.len() as u64;
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "hashing stream is closed")
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = self.inner.as_mut().ok_or_else(closed_error)?;
        let n = inner.read(buf)?;
        let requested = !buf.is_empty();
        self.absorb(&buf[..n], requested);
        Ok(n)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for HashingReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(Err(closed_error()));
        };

        let before = buf.filled().len();
        let requested = buf.remaining() > 0;
        ready!(Pin::new(inner).poll_read(cx, buf))?;

        this.absorb(&buf.filled()[before..], requested);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_hex(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_unsupported_algorithm() {
        let result = HashingReader::new(&b"data"[..], "MD5");
        assert!(matches!(result, Err(StorageError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_algorithm_identifiers() {
        assert_eq!(
            "sha-256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(
            "SHA256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert_eq!(DigestAlgorithm::Sha256.name(), "SHA-256");
    }

    #[test]
    fn test_sync_digest_matches_reference() {
        let data = sample(10_000);
        let mut reader = HashingReader::new(&data[..], "SHA-256").unwrap();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert_eq!(out, data);
        assert!(reader.is_exhausted());
        let digest = reader.signature();
        assert_eq!(digest.to_hex(), reference_hex(&data));
        assert_eq!(digest.length, 10_000);
    }

    #[test]
    fn test_chunk_size_independence() {
        let data = sample(4_097);
        let expected = reference_hex(&data);

        for chunk_size in [1usize, 7, 64, 4_096, 8_192] {
            let mut reader = HashingReader::sha256(&data[..]);
            let mut buf = vec![0u8; chunk_size];
            let mut out = Vec::new();
            loop {
                let n = reader.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                out.extend_from_slice(&buf[..n]);
            }
            assert_eq!(out, data, "chunk size {}", chunk_size);
            assert_eq!(reader.signature().to_hex(), expected, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn test_partial_read_is_not_exhausted() {
        let data = sample(100);
        let mut reader = HashingReader::sha256(&data[..]);
        let mut buf = [0u8; 10];
        reader.read_exact(&mut buf).unwrap();

        assert!(!reader.is_exhausted());
        assert_eq!(reader.bytes_read(), 10);
        assert_eq!(reader.signature().to_hex(), reference_hex(&data[..10]));
    }

    #[test]
    fn test_zero_length_read_does_not_mark_exhausted() {
        let data = sample(16);
        let mut reader = HashingReader::sha256(&data[..]);
        assert_eq!(reader.read(&mut []).unwrap(), 0);
        assert!(!reader.is_exhausted());
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = HashingReader::sha256(&b""[..]);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();

        assert!(reader.is_exhausted());
        assert_eq!(reader.signature().to_hex(), reference_hex(b""));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut reader = HashingReader::sha256(&b"abc"[..]);
        reader.close();
        reader.close();
        assert!(reader.is_closed());

        let mut buf = [0u8; 4];
        assert!(reader.read(&mut buf).is_err());
    }

    #[tokio::test]
    async fn test_async_digest_across_chunks() {
        use tokio::io::AsyncReadExt;

        let mock = tokio_test::io::Builder::new()
            .read(b"hello ")
            .read(b"streaming ")
            .read(b"world")
            .build();
        let mut reader = HashingReader::sha256(mock);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, b"hello streaming world");
        assert!(reader.is_exhausted());
        assert_eq!(
            reader.signature().to_hex(),
            reference_hex(b"hello streaming world")
        );
    }

    #[tokio::test]
    async fn test_async_read_error_propagates() {
        use tokio::io::AsyncReadExt;

        let mock = tokio_test::io::Builder::new()
            .read(b"partial")
            .read_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let mut reader = HashingReader::sha256(mock);

        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(!reader.is_exhausted());
        assert_eq!(reader.bytes_read(), 7);
    }
}
