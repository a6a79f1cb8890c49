//! Azure Blob Storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use azure_core::error::ErrorKind;
use azure_core::StatusCode;
use azure_storage::StorageCredentials;
use azure_storage_blobs::prelude::{BlobServiceClient, ClientBuilder};

use crate::ports::{ObjectStorage, StorageError};

/// Blob containers of one storage account.
pub struct BlobStorage {
    account: String,
    service: BlobServiceClient,
}

impl BlobStorage {
    /// Authenticate with the account's shared key.
    pub fn with_access_key(account: impl Into<String>, access_key: impl Into<String>) -> Self {
        let account = account.into();
        let credentials = StorageCredentials::access_key(account.clone(), access_key.into());
        Self::new(account, credentials)
    }

    /// Authenticate with an Azure AD token credential.
    pub fn with_token_credential(
        account: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
    ) -> Self {
        let account = account.into();
        Self::new(account, StorageCredentials::token_credential(credential))
    }

    fn new(account: String, credentials: StorageCredentials) -> Self {
        let service = ClientBuilder::new(account.clone(), credentials).blob_service_client();
        Self { account, service }
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }
}

fn is_status(err: &azure_core::Error, status: StatusCode) -> bool {
    matches!(err.kind(), ErrorKind::HttpResponse { status: s, .. } if *s == status)
}

#[async_trait]
impl ObjectStorage for BlobStorage {
    fn provider(&self) -> &'static str {
        "Azure Blob"
    }

    // Containers may be deleted out of band; check before every upload.
    fn ensures_container_on_upload(&self) -> bool {
        true
    }

    async fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        self.service
            .container_client(container)
            .exists()
            .await
            .map_err(|e| StorageError::Backend(format!("Azure container check failed: {e}")))
    }

    async fn create_container(&self, container: &str) -> Result<(), StorageError> {
        match self.service.container_client(container).create().await {
            Ok(_) => {
                tracing::info!("Created Azure container {container}");
                Ok(())
            }
            Err(e) => Err(StorageError::Backend(format!(
                "Azure create container {container} failed: {e}"
            ))),
        }
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.service
            .container_client(container)
            .blob_client(key)
            .put_block_blob(body)
            .content_type(content_type.to_string())
            .await
            .map_err(|e| {
                if is_status(&e, StatusCode::NotFound) {
                    StorageError::ContainerNotFound(container.to_string())
                } else {
                    StorageError::Backend(format!("Azure PUT failed: {e}"))
                }
            })?;
        Ok(())
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.service
            .container_client(container)
            .blob_client(key)
            .get_content()
            .await
            .map_err(|e| {
                if is_status(&e, StatusCode::NotFound) {
                    StorageError::NotFound {
                        container: container.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Backend(format!("Azure GET failed: {e}"))
                }
            })
    }
}
