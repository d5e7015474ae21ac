//! Blob codecs for disk entries
//!
//! A codec turns a cached value into bytes and back. Decoding failures must be
//! reported as [`Error::CorruptBlob`] so the disk store can treat the entry as
//! a miss.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encodes and decodes cached values
pub trait BlobCodec<T>: Send + Sync {
    /// File extension of entries written by this codec, without the dot
    fn extension(&self) -> String;

    /// Serialize a value
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value; malformed input is [`Error::CorruptBlob`]
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON blobs via serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> BlobCodec<T> for JsonCodec {
    fn extension(&self) -> String {
        "json".to_string()
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| Error::serialization(format!("Failed to encode cached value: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::corrupt_blob(format!("Failed to decode cached value: {e}")))
    }
}

/// zstd compression around another codec
#[derive(Debug, Clone, Copy)]
pub struct CompressedCodec<C> {
    inner: C,
    level: i32,
}

impl<C> CompressedCodec<C> {
    /// Wrap `inner` using the given zstd level
    #[must_use]
    pub const fn new(inner: C, level: i32) -> Self {
        Self { inner, level }
    }
}

impl<C: Default> Default for CompressedCodec<C> {
    fn default() -> Self {
        Self::new(C::default(), 3)
    }
}

impl<T, C: BlobCodec<T>> BlobCodec<T> for CompressedCodec<C> {
    fn extension(&self) -> String {
        format!("{}.zst", self.inner.extension())
    }

    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        let raw = self.inner.encode(value)?;
        zstd::encode_all(raw.as_slice(), self.level)
            .map_err(|e| Error::serialization(format!("zstd compression failed: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        let raw = zstd::decode_all(bytes)
            .map_err(|e| Error::corrupt_blob(format!("zstd decompression failed: {e}")))?;
        self.inner.decode(&raw)
    }
}
