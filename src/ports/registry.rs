//! Container registry and image builder ports used by deployment.

use std::path::Path;

use async_trait::async_trait;

/// Errors from the registry or the image builder.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("{command} failed with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credentials for pushing to a registry.
#[derive(Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: String,
    pub endpoint: String,
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Image registry (ECR).
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// URI of an existing repository, `None` if it doesn't exist.
    async fn repository_uri(&self, name: &str) -> Result<Option<String>, RegistryError>;

    /// Create a repository and return its URI.
    async fn create_repository(&self, name: &str) -> Result<String, RegistryError>;

    /// Temporary push credentials.
    async fn authorization(&self) -> Result<RegistryAuth, RegistryError>;
}

/// Local image build tool (docker).
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn login(&self, auth: &RegistryAuth) -> Result<(), RegistryError>;

    /// Build `context` into `tag` for `platform`.
    async fn build(&self, context: &Path, tag: &str, platform: &str) -> Result<(), RegistryError>;

    async fn push(&self, tag: &str) -> Result<(), RegistryError>;
}
