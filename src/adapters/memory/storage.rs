//! In-memory object storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::ports::{ObjectStorage, StorageError};

#[derive(Default)]
struct Object {
    body: Vec<u8>,
    content_type: String,
}

/// Object storage keyed by container then key.
pub struct MemoryStorage {
    provider: &'static str,
    containers: RwLock<HashMap<String, HashMap<String, Object>>>,
    ensure_on_upload: bool,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    /// Storage that behaves like S3: uploads require an existing bucket.
    pub fn new(provider: &'static str) -> Self {
        Self {
            provider,
            containers: RwLock::new(HashMap::new()),
            ensure_on_upload: false,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Storage that creates missing containers on upload, like the Azure backend.
    pub fn ensuring_containers(provider: &'static str) -> Self {
        Self {
            ensure_on_upload: true,
            ..Self::new(provider)
        }
    }

    /// Pre-create a container.
    #[must_use]
    pub fn with_container(self, container: &str) -> Self {
        self.containers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(container.to_string())
            .or_default();
        self
    }

    /// Make every call fail until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of objects in a container.
    pub fn object_count(&self, container: &str) -> usize {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container)
            .map_or(0, HashMap::len)
    }

    /// Content type recorded for an object.
    pub fn content_type(&self, container: &str, key: &str) -> Option<String> {
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container)
            .and_then(|c| c.get(key))
            .map(|o| o.content_type.clone())
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(format!("{} is unavailable", self.provider)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    fn provider(&self) -> &'static str {
        self.provider
    }

    fn ensures_container_on_upload(&self) -> bool {
        self.ensure_on_upload
    }

    async fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        self.check_available()?;
        Ok(self
            .containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(container))
    }

    async fn create_container(&self, container: &str) -> Result<(), StorageError> {
        self.check_available()?;
        let mut containers = self.containers.write().unwrap_or_else(PoisonError::into_inner);
        if containers.contains_key(container) {
            return Err(StorageError::Backend(format!(
                "Container {container} already exists"
            )));
        }
        containers.insert(container.to_string(), HashMap::new());
        Ok(())
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.check_available()?;
        let mut containers = self.containers.write().unwrap_or_else(PoisonError::into_inner);
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StorageError::ContainerNotFound(container.to_string()))?;
        objects.insert(
            key.to_string(),
            Object {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.check_available()?;
        self.containers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(container)
            .and_then(|c| c.get(key))
            .map(|o| o.body.clone())
            .ok_or_else(|| StorageError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{Payload, Provisioned};

    #[tokio::test]
    async fn test_reupload_overwrites() {
        let storage = MemoryStorage::new("S3").with_container("bucket");

        storage
            .upload("bucket", "k", Payload::Text("first".into()), false)
            .await
            .expect("upload");
        storage
            .upload("bucket", "k", Payload::Binary(b"second".to_vec()), true)
            .await
            .expect("upload");

        assert_eq!(storage.download("bucket", "k").await.expect("get"), b"second");
        assert_eq!(storage.object_count("bucket"), 1);
        assert_eq!(
            storage.content_type("bucket", "k").as_deref(),
            Some("application/octet-stream")
        );
    }

    #[tokio::test]
    async fn test_text_upload_is_utf8() {
        let storage = MemoryStorage::new("S3").with_container("bucket");
        storage
            .upload("bucket", "t", Payload::from("héllo".to_string()), false)
            .await
            .expect("upload");

        assert_eq!(
            storage.get_object("bucket", "t").await.expect("get"),
            "héllo".as_bytes()
        );
        assert_eq!(
            storage.content_type("bucket", "t").as_deref(),
            Some("text/plain; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn test_upload_without_bucket_fails() {
        let storage = MemoryStorage::new("S3");
        let result = storage
            .upload("missing", "k", Payload::Binary(vec![1]), true)
            .await;
        assert!(matches!(result, Err(StorageError::Upload { provider: "S3", .. })));
    }

    #[tokio::test]
    async fn test_ensuring_backend_creates_container_on_upload() {
        let storage = MemoryStorage::ensuring_containers("Azure Blob");
        storage
            .upload("container", "k", Payload::Binary(vec![1, 2]), true)
            .await
            .expect("upload");
        assert!(storage.container_exists("container").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_ensure_container_is_idempotent() {
        let storage = MemoryStorage::new("S3");
        assert_eq!(
            storage.ensure_container("b").await.expect("ensure"),
            Provisioned::Created
        );
        assert_eq!(
            storage.ensure_container("b").await.expect("ensure"),
            Provisioned::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_not_found_and_unavailable() {
        let storage = MemoryStorage::new("S3").with_container("b");
        assert!(matches!(
            storage.get_object("b", "nope").await,
            Err(StorageError::NotFound { .. })
        ));

        storage.set_unavailable(true);
        assert!(matches!(
            storage.container_exists("b").await,
            Err(StorageError::Backend(_))
        ));
    }
}
