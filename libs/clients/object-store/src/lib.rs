//! Byte-sink capability over S3-compatible object storage.
//!
//! Job handlers see only the narrow [`ByteSink`] trait: put bytes under a
//! bucket/key, get a public URI back. The production implementation talks
//! to MinIO through the `object_store` S3 backend with path-style access;
//! an in-memory implementation backs tests.

mod memory;
mod minio;

pub use memory::MemoryStore;
pub use minio::MinioStore;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object store backend error: {0}")]
    Backend(#[from] object_store::Error),

    #[error("invalid object path '{0}': {1}")]
    Path(String, #[source] object_store::path::Error),

    #[error("object '{bucket}/{key}' not found")]
    NotFound { bucket: String, key: String },

    #[error(transparent)]
    Discovery(#[from] core_config::discovery::DiscoveryError),
}

/// Narrow byte-sink interface handed to job handlers.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// Store `bytes` under `bucket`/`key` and return the object's URI.
    async fn put_bytes(&self, bucket: &str, key: &str, bytes: Vec<u8>)
    -> Result<String, StoreError>;

    /// Fetch an object back. Maintenance/test parity with the put side.
    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// List object keys under a prefix.
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError>;
}
