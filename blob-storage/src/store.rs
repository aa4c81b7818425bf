use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::LocalBoxStream;

use crate::error::{BlobError, BlobResult};

/// Byte stream flowing into or out of a store. Request bodies are not `Send`,
/// so streams stay local to the task that drives them.
pub type ByteStream = LocalBoxStream<'static, io::Result<Bytes>>;

/// An open blob ready to be streamed back to a caller.
pub struct BlobReader {
    pub stream: ByteStream,
    pub size_bytes: u64,
}

/// Trait for storing and fetching immutable blobs by key.
///
/// Implementations must never expose a partially written blob: `put` either
/// makes the whole stream visible under `key` or leaves nothing behind, and
/// that still holds if the returned future is dropped halfway through.
#[async_trait(?Send)]
pub trait BlobStore: Send + Sync {
    /// Drains `data` into a new blob stored under `key`, returning the number of
    /// bytes written. Fails with [`BlobError::AlreadyExists`] rather than
    /// replacing an existing blob, and with [`BlobError::Source`] when `data`
    /// itself yields an error.
    async fn put(&self, key: &str, data: ByteStream) -> BlobResult<u64>;

    /// Opens the blob stored under `key`.
    async fn get(&self, key: &str) -> BlobResult<BlobReader>;

    async fn exists(&self, key: &str) -> BlobResult<bool>;

    /// Removes the blob under `key`. Returns `false` if there was nothing to remove.
    async fn delete(&self, key: &str) -> BlobResult<bool>;
}

/// Rejects keys that could escape a flat storage namespace.
///
/// Keys are single path components: no separators, no NUL, no `.`/`..`, and
/// no leading dot (hidden names are reserved for in-flight uploads).
pub fn validate_key(key: &str) -> BlobResult<()> {
    let addressable = !key.is_empty()
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0']);
    if addressable {
        Ok(())
    } else {
        Err(BlobError::invalid_key(key))
    }
}
