use std::sync::Arc;

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::test;
use actix_web::web::Data;
use async_trait::async_trait;
use blob_store::{
    BlobError, BlobReader, BlobResult, BlobStore, ByteStream, KeyGenerator, MemoryBlobStore,
    RandomKeyGenerator,
};
use futures_util::StreamExt;

use crate::app::{AppState, ServerConfig};
use crate::cors::CorsPolicy;

pub const TRUSTED_ORIGIN: &str = "https://excalidraw.com";

pub fn app_state(store: Arc<dyn BlobStore>, keys: Arc<dyn KeyGenerator>, max_upload_bytes: u64) -> AppState {
    AppState {
        store,
        keys,
        config: ServerConfig { max_upload_bytes, ..ServerConfig::default() },
        cors: CorsPolicy::reflect_all(),
    }
}

pub fn state_with(store: Arc<dyn BlobStore>, keys: Arc<dyn KeyGenerator>, max_upload_bytes: u64) -> Data<AppState> {
    Data::new(app_state(store, keys, max_upload_bytes))
}

pub fn memory_state(max_upload_bytes: u64) -> (Data<AppState>, Arc<MemoryBlobStore>) {
    let store = Arc::new(MemoryBlobStore::new());
    let state = state_with(store.clone(), Arc::new(RandomKeyGenerator), max_upload_bytes);
    (state, store)
}

pub async fn body_json<B: MessageBody>(resp: ServiceResponse<B>) -> serde_json::Value {
    test::read_body_json(resp).await
}

/// Always hands out the same key.
pub struct FixedKeys(pub &'static str);

impl KeyGenerator for FixedKeys {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}

/// Accepts the body, then fails as a full disk would.
pub struct FailingStore;

#[async_trait(?Send)]
impl BlobStore for FailingStore {
    async fn put(&self, _key: &str, mut data: ByteStream) -> BlobResult<u64> {
        while let Some(chunk) = data.next().await {
            chunk.map_err(BlobError::Source)?;
        }
        Err(BlobError::Io(std::io::Error::new(std::io::ErrorKind::Other, "no space left on device")))
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        Err(BlobError::not_found(key))
    }

    async fn exists(&self, _key: &str) -> BlobResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> BlobResult<bool> {
        Ok(false)
    }
}

/// Claims every blob exists, but none can be opened.
pub struct VanishingStore;

#[async_trait(?Send)]
impl BlobStore for VanishingStore {
    async fn put(&self, _key: &str, _data: ByteStream) -> BlobResult<u64> {
        Ok(0)
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        Err(BlobError::not_found(key))
    }

    async fn exists(&self, _key: &str) -> BlobResult<bool> {
        Ok(true)
    }

    async fn delete(&self, _key: &str) -> BlobResult<bool> {
        Ok(false)
    }
}

/// Never finishes a `put`. With `publish_first` the blob lands in `inner`
/// before the hang, as if the deadline fired right after publishing.
pub struct StallingStore {
    pub inner: Arc<MemoryBlobStore>,
    pub publish_first: bool,
}

#[async_trait(?Send)]
impl BlobStore for StallingStore {
    async fn put(&self, key: &str, data: ByteStream) -> BlobResult<u64> {
        if self.publish_first {
            self.inner.put(key, data).await?;
        }
        futures_util::future::pending().await
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> BlobResult<bool> {
        self.inner.exists(key).await
    }

    async fn delete(&self, key: &str) -> BlobResult<bool> {
        self.inner.delete(key).await
    }
}
