//! Azure Resource Manager client for resource groups and storage accounts.
//!
//! Talks to the ARM REST API directly with a bearer token from
//! `azure_identity`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use serde::Deserialize;
use serde_json::json;

use crate::ports::{ResourceError, ResourceManager};

const ARM_ENDPOINT: &str = "https://management.azure.com";
const ARM_SCOPE: &str = "https://management.azure.com/.default";
const RESOURCE_GROUP_API: &str = "2021-04-01";
const STORAGE_API: &str = "2023-01-01";

/// Poll settings while a storage account is being created.
const PROVISION_POLL_INTERVAL: Duration = Duration::from_secs(5);
const PROVISION_POLL_ATTEMPTS: u32 = 60;

pub struct ArmResourceManager {
    http: reqwest::Client,
    credential: Arc<dyn TokenCredential>,
    subscription_id: String,
}

/// How a poll response during account creation is read.
#[derive(Debug, PartialEq, Eq)]
enum PollStatus {
    /// The body carries a provisioning state.
    Ready,
    /// The account is not visible yet after the 202.
    NotVisible,
    Failed,
}

impl PollStatus {
    fn classify(status: reqwest::StatusCode) -> Self {
        if status.is_success() {
            PollStatus::Ready
        } else if status == reqwest::StatusCode::NOT_FOUND {
            PollStatus::NotVisible
        } else {
            PollStatus::Failed
        }
    }
}

#[derive(Deserialize)]
struct StorageAccount {
    #[serde(default)]
    properties: StorageAccountProperties,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct StorageAccountProperties {
    #[serde(default)]
    provisioning_state: Option<String>,
}

#[derive(Deserialize)]
struct KeyList {
    keys: Vec<AccountKey>,
}

#[derive(Deserialize)]
struct AccountKey {
    value: String,
}

impl ArmResourceManager {
    pub fn new(credential: Arc<dyn TokenCredential>, subscription_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            credential,
            subscription_id: subscription_id.into(),
        }
    }

    fn resource_group_url(&self, name: &str) -> String {
        format!(
            "{ARM_ENDPOINT}/subscriptions/{}/resourcegroups/{name}?api-version={RESOURCE_GROUP_API}",
            self.subscription_id
        )
    }

    fn storage_account_url(&self, resource_group: &str, account: &str, action: &str) -> String {
        format!(
            "{ARM_ENDPOINT}/subscriptions/{}/resourceGroups/{resource_group}/providers/Microsoft.Storage/storageAccounts/{account}{action}?api-version={STORAGE_API}",
            self.subscription_id
        )
    }

    /// ARM rejects a bodiless POST without `Content-Length` (411).
    fn list_keys_request(http: &reqwest::Client, url: String) -> reqwest::RequestBuilder {
        http.post(url).header(reqwest::header::CONTENT_LENGTH, "0")
    }

    async fn bearer(&self) -> Result<String, ResourceError> {
        let token = self
            .credential
            .get_token(&[ARM_SCOPE])
            .await
            .map_err(|e| ResourceError::Auth(e.to_string()))?;
        Ok(token.token.secret().to_string())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ResourceError> {
        let token = self.bearer().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ResourceError::Backend(e.to_string()))
    }

    /// Map a response to `Ok(true)` for 2xx, `Ok(false)` for 404.
    async fn exists(response: reqwest::Response) -> Result<bool, ResourceError> {
        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(Self::status_error(response).await)
        }
    }

    async fn status_error(response: reqwest::Response) -> ResourceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ResourceError::Status { status, body }
    }

    async fn provisioning_state(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<Option<String>, ResourceError> {
        let url = self.storage_account_url(resource_group, account, "");
        let response = self.send(self.http.get(url)).await?;
        match PollStatus::classify(response.status()) {
            PollStatus::Ready => {}
            PollStatus::NotVisible => return Ok(None),
            PollStatus::Failed => return Err(Self::status_error(response).await),
        }
        let account: StorageAccount = response
            .json()
            .await
            .map_err(|e| ResourceError::Backend(format!("Invalid storage account body: {e}")))?;
        Ok(account.properties.provisioning_state)
    }
}

#[async_trait]
impl ResourceManager for ArmResourceManager {
    async fn resource_group_exists(&self, name: &str) -> Result<bool, ResourceError> {
        let response = self.send(self.http.head(self.resource_group_url(name))).await?;
        Self::exists(response).await
    }

    async fn create_resource_group(&self, name: &str, location: &str) -> Result<(), ResourceError> {
        let request = self
            .http
            .put(self.resource_group_url(name))
            .json(&json!({ "location": location }));
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        Ok(())
    }

    async fn storage_account_exists(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<bool, ResourceError> {
        let url = self.storage_account_url(resource_group, account, "");
        let response = self.send(self.http.get(url)).await?;
        Self::exists(response).await
    }

    async fn create_storage_account(
        &self,
        resource_group: &str,
        account: &str,
        location: &str,
    ) -> Result<(), ResourceError> {
        let body = json!({
            "location": location,
            "sku": { "name": "Standard_LRS" },
            "kind": "StorageV2",
            "properties": { "supportsHttpsTrafficOnly": true },
        });
        let url = self.storage_account_url(resource_group, account, "");
        let response = self.send(self.http.put(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        // Creation is asynchronous (202 Accepted)
        for _ in 0..PROVISION_POLL_ATTEMPTS {
            match self.provisioning_state(resource_group, account).await?.as_deref() {
                Some("Succeeded") => return Ok(()),
                Some("Failed") => {
                    return Err(ResourceError::Backend(format!(
                        "Storage account {account} provisioning failed"
                    )))
                }
                state => {
                    tracing::debug!("Storage account {account} state: {state:?}");
                    tokio::time::sleep(PROVISION_POLL_INTERVAL).await;
                }
            }
        }
        Err(ResourceError::Timeout(format!("storage account {account}")))
    }

    async fn storage_account_key(
        &self,
        resource_group: &str,
        account: &str,
    ) -> Result<String, ResourceError> {
        let url = self.storage_account_url(resource_group, account, "/listKeys");
        let response = self
            .send(Self::list_keys_request(&self.http, url))
            .await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }
        let keys: KeyList = response
            .json()
            .await
            .map_err(|e| ResourceError::Backend(format!("Invalid key list: {e}")))?;
        keys.keys
            .into_iter()
            .next()
            .map(|k| k.value)
            .ok_or_else(|| ResourceError::Backend(format!("No keys for account {account}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_account_body_parsing() {
        let body = r#"{"name":"acct","properties":{"provisioningState":"Creating"}}"#;
        let account: StorageAccount = serde_json::from_str(body).expect("parse");
        assert_eq!(account.properties.provisioning_state.as_deref(), Some("Creating"));

        let keys: KeyList =
            serde_json::from_str(r#"{"keys":[{"keyName":"key1","value":"abc","permissions":"FULL"}]}"#)
                .expect("parse");
        assert_eq!(keys.keys[0].value, "abc");
    }

    #[test]
    fn test_list_keys_request_declares_empty_body() {
        let request = ArmResourceManager::list_keys_request(
            &reqwest::Client::new(),
            "https://management.azure.com/acct/listKeys?api-version=2023-01-01".into(),
        )
        .build()
        .expect("request");
        assert_eq!(request.method(), &reqwest::Method::POST);
        assert_eq!(
            request
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok()),
            Some("0")
        );
    }

    #[test]
    fn test_poll_treats_not_found_as_pending() {
        use reqwest::StatusCode;

        assert_eq!(PollStatus::classify(StatusCode::OK), PollStatus::Ready);
        assert_eq!(PollStatus::classify(StatusCode::NOT_FOUND), PollStatus::NotVisible);
        assert_eq!(PollStatus::classify(StatusCode::FORBIDDEN), PollStatus::Failed);
    }
}
