//! Object storage port: buckets (S3) and containers (Azure Blob).
//!
//! Both providers share one contract: a named container holding byte
//! objects, overwritten on re-upload, without versioning.

use async_trait::async_trait;

/// Errors from object storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("{provider} upload of {container}/{key} failed: {message}")]
    Upload {
        provider: &'static str,
        container: String,
        key: String,
        message: String,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Upload body.
///
/// Only text and raw bytes can be uploaded; anything else has to be
/// serialized by the caller first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    /// Bytes to send. Text is UTF-8 encoded in both modes; the flag only
    /// decides the content type.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.into_bytes(),
            Self::Binary(b) => b,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content type for the stored object.
    #[must_use]
    pub fn content_type(&self, binary: bool) -> &'static str {
        match (self, binary) {
            (Self::Text(_), false) => "text/plain; charset=utf-8",
            _ => "application/octet-stream",
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(b: Vec<u8>) -> Self {
        Self::Binary(b)
    }
}

/// Whether `ensure_container` had to create anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyExists,
}

impl std::fmt::Display for Provisioned {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AlreadyExists => write!(f, "already exists"),
        }
    }
}

/// Object storage backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Provider name used in log lines ("S3", "Azure Blob").
    fn provider(&self) -> &'static str;

    /// Check whether a bucket/container exists.
    async fn container_exists(&self, container: &str) -> Result<bool, StorageError>;

    /// Create a bucket/container. Fails if it already exists.
    async fn create_container(&self, container: &str) -> Result<(), StorageError>;

    /// Store `body` under `key`, replacing any previous object.
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Fetch an object.
    ///
    /// Returns `StorageError::NotFound` if the key doesn't exist.
    async fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Whether `upload` must ensure the container first.
    fn ensures_container_on_upload(&self) -> bool {
        false
    }

    /// Create the container unless it already exists.
    async fn ensure_container(&self, container: &str) -> Result<Provisioned, StorageError> {
        if self.container_exists(container).await? {
            return Ok(Provisioned::AlreadyExists);
        }
        self.create_container(container).await?;
        Ok(Provisioned::Created)
    }

    /// Upload a payload and log the outcome.
    async fn upload(
        &self,
        container: &str,
        key: &str,
        payload: Payload,
        binary: bool,
    ) -> Result<(), StorageError> {
        let provider = self.provider();
        let result = async {
            if self.ensures_container_on_upload() {
                self.ensure_container(container).await?;
            }
            let content_type = payload.content_type(binary);
            self.put_object(container, key, payload.into_bytes(), content_type)
                .await
        }
        .await;

        match result {
            Ok(()) => {
                tracing::info!("Uploaded {key} to {provider} container {container}");
                Ok(())
            }
            Err(e) => {
                tracing::error!("{provider} upload of {container}/{key} failed: {e}");
                Err(StorageError::Upload {
                    provider,
                    container: container.to_string(),
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Alias for `get_object` used by the remote function.
    async fn download(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.get_object(container, key).await
    }
}
