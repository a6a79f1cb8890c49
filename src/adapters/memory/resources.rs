//! In-memory resource manager.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::ports::{ResourceError, ResourceManager};

#[derive(Default)]
pub struct MemoryResourceManager {
    groups: RwLock<HashSet<String>>,
    /// `(resource_group, account)` to account key.
    accounts: RwLock<HashMap<(String, String), String>>,
}

impl MemoryResourceManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceManager for MemoryResourceManager {
    async fn resource_group_exists(&self, name: &str) -> Result<bool, ResourceError> {
        Ok(self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name))
    }

    async fn create_resource_group(&self, name: &str, _location: &str) -> Result<(), ResourceError> {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
        Ok(())
    }

    async fn storage_account_exists(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<bool, ResourceError> {
        Ok(self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&(resource_group.to_string(), account.to_string())))
    }

    async fn create_storage_account(
        &self,
        resource_group: &str,
        account: &str,
        _location: &str,
    ) -> Result<(), ResourceError> {
        if !self.resource_group_exists(resource_group).await? {
            return Err(ResourceError::Status {
                status: 404,
                body: format!("Resource group {resource_group} not found"),
            });
        }
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (resource_group.to_string(), account.to_string()),
                format!("{account}-key"),
            );
        Ok(())
    }

    async fn storage_account_key(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<String, ResourceError> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(resource_group.to_string(), account.to_string()))
            .cloned()
            .ok_or_else(|| ResourceError::Status {
                status: 404,
                body: format!("Storage account {account} not found"),
            })
    }
}
