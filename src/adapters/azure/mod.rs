//! Azure adapters: Blob Storage and Resource Manager.

mod blob;
mod management;

pub use blob::BlobStorage;
pub use management::ArmResourceManager;

use std::sync::Arc;

use azure_core::auth::TokenCredential;

/// Credential from the environment, managed identity or Azure CLI login.
///
/// # Errors
/// Returns the identity error if no credential source is available.
pub fn default_credential() -> Result<Arc<dyn TokenCredential>, String> {
    azure_identity::create_credential().map_err(|e| format!("No Azure credential available: {e}"))
}
