//! Keyed, immutable blob storage: a small `BlobStore` capability with
//! filesystem and in-memory backends, plus the key generator used to name
//! new blobs.

pub mod error;
pub mod key;
pub mod local_store;
pub mod memory_store;
pub mod store;

pub use error::{BlobError, BlobResult};
pub use key::{KeyGenerator, RandomKeyGenerator};
pub use local_store::LocalFileBlobStore;
pub use memory_store::MemoryBlobStore;
pub use store::{validate_key, BlobReader, BlobStore, ByteStream};
