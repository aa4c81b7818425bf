use std::io;
use thiserror::Error;

pub type BlobResult<T> = Result<T, BlobError>;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("No blob stored under key {key}")]
    NotFound { key: String },

    #[error("Key {key:?} is not addressable in this store")]
    InvalidKey { key: String },

    #[error("A blob is already stored under key {key}")]
    AlreadyExists { key: String },

    /// The incoming byte stream failed before it was fully written.
    #[error("Failed to read blob contents: {0}")]
    Source(#[source] io::Error),

    #[error("Storage I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl BlobError {
    pub fn not_found(key: &str) -> Self {
        BlobError::NotFound { key: key.to_string() }
    }

    pub fn invalid_key(key: &str) -> Self {
        BlobError::InvalidKey { key: key.to_string() }
    }

    pub fn already_exists(key: &str) -> Self {
        BlobError::AlreadyExists { key: key.to_string() }
    }
}
