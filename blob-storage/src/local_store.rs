use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::error::{BlobError, BlobResult};
use crate::store::{validate_key, BlobReader, BlobStore, ByteStream};

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Stores each blob as one file directly under `base_path`, named by its key.
#[derive(Clone, Debug)]
pub struct LocalFileBlobStore {
    base_path: PathBuf,
    sync_writes: bool,
}

impl LocalFileBlobStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into(), sync_writes: false }
    }

    /// Fsync every blob before it becomes visible under its key.
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn blob_path(&self, key: &str) -> BlobResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    fn partial_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!(".{}.partial-{}", key, Uuid::new_v4().simple()))
    }
}

/// An in-flight upload file. Removed on drop unless it was handed off, so a
/// cancelled `put` never leaves bytes behind.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self) {
        self.armed = false;
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("failed to remove partial upload {}: {}", self.path.display(), e),
        }
    }
}

fn discard_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("discarded partial upload {}", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::error!("failed to discard partial upload {}: {}", path.display(), e),
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Only reached when the `put` future is dropped mid-write. Keep the
        // unlink off the async workers when a runtime is around.
        let path = std::mem::take(&mut self.path);
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || discard_partial(&path));
            }
            Err(_) => discard_partial(&path),
        }
    }
}

fn is_partial_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(".partial-")
}

impl LocalFileBlobStore {
    /// Removes upload files orphaned by a process that died mid-write.
    /// Run once at startup, before the store takes requests.
    pub async fn sweep_partials(&self) -> BlobResult<usize> {
        let mut dir = match fs::read_dir(&self.base_path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            if !name.to_str().map_or(false, is_partial_name) {
                continue;
            }
            match fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }

    async fn write_partial(
        &self,
        key: &str,
        partial: &PartialFile,
        final_path: &Path,
        mut data: ByteStream,
    ) -> BlobResult<u64> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(partial.path())
            .await?;

        let mut written: u64 = 0;
        while let Some(chunk) = data.next().await {
            let chunk = chunk.map_err(BlobError::Source)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        if self.sync_writes {
            file.sync_all().await?;
        }
        drop(file);

        // A hard link publishes the finished file atomically and, unlike a
        // rename, refuses to replace a blob that is already there.
        match fs::hard_link(partial.path(), final_path).await {
            Ok(()) => Ok(written),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(BlobError::already_exists(key)),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait(?Send)]
impl BlobStore for LocalFileBlobStore {
    async fn put(&self, key: &str, data: ByteStream) -> BlobResult<u64> {
        let final_path = self.blob_path(key)?;
        fs::create_dir_all(&self.base_path).await?;

        let partial = PartialFile::new(self.partial_path(key));
        let outcome = self.write_partial(key, &partial, &final_path, data).await;
        partial.remove().await;
        outcome
    }

    async fn get(&self, key: &str) -> BlobResult<BlobReader> {
        let path = self.blob_path(key)?;
        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(BlobError::not_found(key)),
            Err(e) => return Err(e.into()),
        };
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(BlobError::not_found(key));
        }
        Ok(BlobReader {
            stream: ReaderStream::with_capacity(file, READ_CHUNK_BYTES).boxed_local(),
            size_bytes: metadata.len(),
        })
    }

    async fn exists(&self, key: &str) -> BlobResult<bool> {
        let path = self.blob_path(key)?;
        match fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> BlobResult<bool> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
