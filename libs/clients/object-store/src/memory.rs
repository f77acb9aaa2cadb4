//! In-memory [`ByteSink`] for tests.

use crate::{ByteSink, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// Stores objects in a map; URIs use the `memory://` scheme unless an
/// endpoint is given, in which case they mirror the MinIO URI shape.
#[derive(Default)]
pub struct MemoryStore {
    endpoint: Option<String>,
    objects: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirror the URI shape of a real endpoint (host:port) for assertions.
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            objects: RwLock::new(BTreeMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn object_uri(&self, bucket: &str, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("http://{endpoint}/{bucket}/{key}"),
            None => format!("memory://{bucket}/{key}"),
        }
    }
}

#[async_trait]
impl ByteSink for MemoryStore {
    async fn put_bytes(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
    ) -> Result<String, StoreError> {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(self.object_uri(bucket, key))
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .read()
            .await
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let store = MemoryStore::new();
        let uri = store
            .put_bytes("bucket", "a/b/c.mp4", vec![1, 2, 3])
            .await
            .unwrap();
        assert_eq!(uri, "memory://bucket/a/b/c.mp4");
        assert_eq!(store.get_bytes("bucket", "a/b/c.mp4").await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_bytes("bucket", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_keys_by_prefix() {
        let store = MemoryStore::new();
        store.put_bytes("b", "videos/1/v.mp4", vec![]).await.unwrap();
        store.put_bytes("b", "videos/2/v.mp4", vec![]).await.unwrap();
        store.put_bytes("b", "audio/1/a.mp3", vec![]).await.unwrap();

        let keys = store.list_keys("b", "videos/").await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn test_endpoint_uri_shape() {
        let store = MemoryStore::with_endpoint("localhost:9000");
        let uri = store.put_bytes("kids-pinkfong", "k", vec![]).await.unwrap();
        assert_eq!(uri, "http://localhost:9000/kids-pinkfong/k");
    }
}
