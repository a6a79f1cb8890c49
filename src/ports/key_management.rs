//! Key management port: wrapping keys under a managed key-encryption key.

use async_trait::async_trait;

/// Errors from the key management service.
#[derive(Debug, thiserror::Error)]
pub enum KmsError {
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Key wrap failed: {0}")]
    Wrap(String),

    #[error("Key management backend error: {0}")]
    Backend(String),
}

/// Managed key service (AWS KMS or an in-memory stand-in).
#[async_trait]
pub trait KeyManagement: Send + Sync {
    /// Encrypt `plaintext` under the managed key `key_id`.
    async fn wrap(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, KmsError>;

    /// Find an enabled key by its description.
    async fn find_key_by_description(&self, description: &str)
        -> Result<Option<String>, KmsError>;

    /// Create a symmetric key and return its id.
    async fn create_key(&self, description: &str) -> Result<String, KmsError>;
}
