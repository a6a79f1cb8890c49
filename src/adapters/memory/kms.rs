//! In-memory key management with real AES-GCM wrapping.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::symmetric::{self, SymmetricKey};
use crate::ports::{KeyManagement, KmsError};

struct ManagedKey {
    description: String,
    key: SymmetricKey,
}

/// Key service holding random key-encryption keys in memory.
#[derive(Default)]
pub struct MemoryKms {
    keys: RwLock<HashMap<String, ManagedKey>>,
    counter: RwLock<u32>,
}

impl MemoryKms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key under a fixed id.
    #[must_use]
    pub fn with_key(self, key_id: &str, description: &str) -> Self {
        self.keys.write().unwrap_or_else(PoisonError::into_inner).insert(
            key_id.to_string(),
            ManagedKey {
                description: description.to_string(),
                key: SymmetricKey::generate(),
            },
        );
        self
    }

    /// Reverse [`KeyManagement::wrap`].
    ///
    /// # Errors
    /// Returns `KmsError::KeyNotFound` or `KmsError::Wrap` for a bad blob.
    pub fn unwrap_blob(&self, key_id: &str, blob: &[u8]) -> Result<Vec<u8>, KmsError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let managed = keys
            .get(key_id)
            .ok_or_else(|| KmsError::KeyNotFound(key_id.to_string()))?;
        symmetric::decrypt(&managed.key, blob).map_err(|e| KmsError::Wrap(e.to_string()))
    }

    pub fn key_count(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl KeyManagement for MemoryKms {
    async fn wrap(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let managed = keys
            .get(key_id)
            .ok_or_else(|| KmsError::KeyNotFound(key_id.to_string()))?;
        symmetric::encrypt(&managed.key, plaintext).map_err(|e| KmsError::Wrap(e.to_string()))
    }

    async fn find_key_by_description(
        &self,
        description: &str,
    ) -> Result<Option<String>, KmsError> {
        Ok(self
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(_, k)| k.description == description)
            .map(|(id, _)| id.clone()))
    }

    async fn create_key(&self, description: &str) -> Result<String, KmsError> {
        let mut counter = self.counter.write().unwrap_or_else(PoisonError::into_inner);
        *counter += 1;
        let key_id = format!("memory-key-{}", *counter);
        self.keys.write().unwrap_or_else(PoisonError::into_inner).insert(
            key_id.clone(),
            ManagedKey {
                description: description.to_string(),
                key: SymmetricKey::generate(),
            },
        );
        Ok(key_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wrap_and_unwrap() {
        let kms = MemoryKms::new().with_key("alias/test", "Key for metadata encryption");
        let blob = kms.wrap("alias/test", b"aes-key-bytes").await.expect("wrap");

        assert_ne!(blob, b"aes-key-bytes");
        assert_eq!(kms.unwrap_blob("alias/test", &blob).expect("unwrap"), b"aes-key-bytes");
    }

    #[tokio::test]
    async fn test_unknown_key() {
        let kms = MemoryKms::new();
        assert!(matches!(
            kms.wrap("missing", b"x").await,
            Err(KmsError::KeyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_and_create() {
        let kms = MemoryKms::new();
        assert_eq!(kms.find_key_by_description("desc").await.expect("find"), None);

        let id = kms.create_key("desc").await.expect("create");
        assert_eq!(
            kms.find_key_by_description("desc").await.expect("find"),
            Some(id)
        );
        assert_eq!(kms.key_count(), 1);
    }
}
