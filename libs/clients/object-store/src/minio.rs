//! MinIO-backed implementation of [`ByteSink`].

use crate::{ByteSink, StoreError};
use async_trait::async_trait;
use core_config::discovery::ServiceDiscovery;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

// MinIO ignores the region but the S3 builder requires one.
const DEFAULT_REGION: &str = "us-east-1";

/// S3-compatible byte sink pointed at a MinIO endpoint.
///
/// Buckets map to separate `object_store` instances; they are built lazily
/// and cached for the life of the client.
pub struct MinioStore {
    endpoint: String,
    access_key: Option<String>,
    secret_key: Option<String>,
    buckets: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl MinioStore {
    pub fn new(
        endpoint: impl Into<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key,
            secret_key,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Build a store from the discovered MinIO endpoint and credentials.
    pub fn from_discovery(sd: &ServiceDiscovery) -> Result<Self, StoreError> {
        Ok(Self::new(
            sd.minio_endpoint()?,
            sd.minio_access_key(),
            sd.minio_secret_key(),
        ))
    }

    fn build_bucket_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&self.endpoint)
            .with_bucket_name(bucket)
            .with_region(DEFAULT_REGION)
            .with_allow_http(true)
            .with_virtual_hosted_style_request(false);

        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => {
                builder = builder
                    .with_access_key_id(access)
                    .with_secret_access_key(secret);
            }
            _ => {
                builder = builder.with_skip_signature(true);
            }
        }

        Ok(Arc::new(builder.build()?))
    }

    async fn bucket_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StoreError> {
        let mut buckets = self.buckets.lock().await;
        if let Some(store) = buckets.get(bucket) {
            return Ok(Arc::clone(store));
        }
        let store = self.build_bucket_store(bucket)?;
        buckets.insert(bucket.to_string(), Arc::clone(&store));
        Ok(store)
    }

    /// Public URI of an object, in the form the feedback envelope carries.
    fn object_uri(&self, bucket: &str, key: &str) -> String {
        let authority = self
            .endpoint
            .strip_prefix("http://")
            .or_else(|| self.endpoint.strip_prefix("https://"))
            .unwrap_or(&self.endpoint);
        format!("http://{authority}/{bucket}/{key}")
    }
}

fn parse_path(raw: &str) -> Result<Path, StoreError> {
    Path::parse(raw).map_err(|e| StoreError::Path(raw.to_string(), e))
}

#[async_trait]
impl ByteSink for MinioStore {
    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StoreError> {
        let store = self.bucket_store(bucket).await?;
        let path = parse_path(key)?;
        let size = bytes.len();
        store.put(&path, PutPayload::from(bytes)).await?;
        let uri = self.object_uri(bucket, key);
        info!(bucket, key, size, uri = %uri, "Uploaded object");
        Ok(uri)
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let store = self.bucket_store(bucket).await?;
        let path = parse_path(key)?;
        let result = store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            other => StoreError::Backend(other),
        })?;
        Ok(result.bytes().await?.to_vec())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        let store = self.bucket_store(bucket).await?;
        let path = parse_path(prefix)?;
        let objects: Vec<_> = store.list(Some(&path)).try_collect().await?;
        Ok(objects.into_iter().map(|meta| meta.location.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_uri_shape() {
        let store = MinioStore::new("http://localhost:9000", None, None);
        assert_eq!(
            store.object_uri("kids-pinkfong", "video-downloader/videos/XqZsoesa55w/video.mp4"),
            "http://localhost:9000/kids-pinkfong/video-downloader/videos/XqZsoesa55w/video.mp4"
        );
    }

    #[test]
    fn test_object_uri_strips_scheme_once() {
        let store = MinioStore::new("https://minio.internal:9000", None, None);
        assert_eq!(
            store.object_uri("bucket", "key"),
            "http://minio.internal:9000/bucket/key"
        );
    }
}
