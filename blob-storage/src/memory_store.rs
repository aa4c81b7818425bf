use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::{stream, StreamExt};

use crate::error::{BlobError, BlobResult};
use crate::store::{validate_key, BlobReader, BlobStore, ByteStream};

/// Keeps blobs in process memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait(?Send)]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, mut data: ByteStream) -> BlobResult<u64> {
        validate_key(key)?;
        if self.blobs.contains_key(key) {
            return Err(BlobError::already_exists(key));
        }

        // Nothing is inserted until the stream has been fully drained.
        let mut buffer = BytesMut::new();
        while let Some(chunk) = data.next().await {
            buffer.extend_from_slice(&chunk.map_err(BlobError::Source)?);
        }

        let blob = buffer.freeze();
        let written = blob.len() as u64;
        match self.blobs.entry(key.to_string()) {
            Entry::Occupied(_) => Err(BlobError::already_exists(key)),
            Entry::Vacant(slot) => {
                slot.insert(blob);
                Ok(written)
            }
        }
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        validate_key(key)?;
        let blob = self
            .blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BlobError::not_found(key))?;
        Ok(BlobReader {
            size_bytes: blob.len() as u64,
            stream: stream::once(async move { Ok(blob) }).boxed_local(),
        })
    }

    async fn exists(&self, key: &str) -> BlobResult<bool> {
        validate_key(key)?;
        Ok(self.blobs.contains_key(key))
    }

    async fn delete(&self, key: &str) -> BlobResult<bool> {
        validate_key(key)?;
        Ok(self.blobs.remove(key).is_some())
    }
}
