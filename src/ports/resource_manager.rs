//! Cloud resource manager port: resource groups and storage accounts.

use async_trait::async_trait;

/// Errors from the resource manager.
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Resource request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Resource manager error: {0}")]
    Backend(String),
}

/// Management-plane operations needed before blobs can be stored.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn resource_group_exists(&self, name: &str) -> Result<bool, ResourceError>;

    async fn create_resource_group(&self, name: &str, location: &str) -> Result<(), ResourceError>;

    async fn storage_account_exists(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<bool, ResourceError>;

    /// Create a general-purpose v2 account and wait until it is usable.
    async fn create_storage_account(
        &self,
        resource_group: &str,
        account: &str,
        location: &str,
    ) -> Result<(), ResourceError>;

    /// First access key of the account.
    async fn storage_account_key(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<String, ResourceError>;
}
