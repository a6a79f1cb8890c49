//! AWS KMS key wrapping.

use async_trait::async_trait;
use aws_sdk_kms::operation::encrypt::EncryptError;
use aws_sdk_kms::primitives::Blob;
use aws_sdk_kms::types::KeyState;
use aws_sdk_kms::Client;

use super::describe;
use crate::ports::{KeyManagement, KmsError};

pub struct KmsKeys {
    client: Client,
}

impl KmsKeys {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }

    async fn list_key_ids(&self) -> Result<Vec<String>, KmsError> {
        let mut ids = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = self
                .client
                .list_keys()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|e| KmsError::Backend(format!("ListKeys failed: {}", describe(&e))))?;

            ids.extend(
                response
                    .keys()
                    .iter()
                    .filter_map(|k| k.key_id().map(str::to_string)),
            );

            match response.next_marker() {
                Some(next) if response.truncated() => marker = Some(next.to_string()),
                _ => break,
            }
        }

        Ok(ids)
    }
}

/// KMS reports an unknown key as `NotFoundException` on HTTP 400.
fn missing_key(key_id: &str, err: &EncryptError) -> Option<KmsError> {
    err.is_not_found_exception()
        .then(|| KmsError::KeyNotFound(key_id.to_string()))
}

#[async_trait]
impl KeyManagement for KmsKeys {
    async fn wrap(&self, key_id: &str, plaintext: &[u8]) -> Result<Vec<u8>, KmsError> {
        let response = self
            .client
            .encrypt()
            .key_id(key_id)
            .plaintext(Blob::new(plaintext))
            .send()
            .await
            .map_err(|e| {
                e.as_service_error()
                    .and_then(|se| missing_key(key_id, se))
                    .unwrap_or_else(|| KmsError::Wrap(describe(&e)))
            })?;

        response
            .ciphertext_blob()
            .map(|blob| blob.as_ref().to_vec())
            .ok_or_else(|| KmsError::Wrap("KMS returned no ciphertext".into()))
    }

    async fn find_key_by_description(
        &self,
        description: &str,
    ) -> Result<Option<String>, KmsError> {
        for key_id in self.list_key_ids().await? {
            let response = match self.client.describe_key().key_id(&key_id).send().await {
                Ok(r) => r,
                // Keys in other accounts' grants can be listed but not described
                Err(e) => {
                    tracing::debug!("Skipping KMS key {key_id}: {}", describe(&e));
                    continue;
                }
            };
            let Some(metadata) = response.key_metadata() else {
                continue;
            };
            let enabled = matches!(metadata.key_state(), Some(KeyState::Enabled));
            if enabled && metadata.description() == Some(description) {
                return Ok(Some(metadata.key_id().to_string()));
            }
        }
        Ok(None)
    }

    async fn create_key(&self, description: &str) -> Result<String, KmsError> {
        let response = self
            .client
            .create_key()
            .description(description)
            .send()
            .await
            .map_err(|e| KmsError::Backend(format!("CreateKey failed: {}", describe(&e))))?;

        response
            .key_metadata()
            .map(|m| m.key_id().to_string())
            .ok_or_else(|| KmsError::Backend("CreateKey returned no metadata".into()))
    }
}

#[cfg(test)]
mod tests {
    use aws_sdk_kms::types::error::{DisabledException, NotFoundException};

    use super::*;

    #[test]
    fn test_unknown_key_maps_to_key_not_found() {
        let err = EncryptError::NotFoundException(
            NotFoundException::builder().message("Key not found").build(),
        );
        assert!(matches!(
            missing_key("alias/gone", &err),
            Some(KmsError::KeyNotFound(id)) if id == "alias/gone"
        ));

        let err = EncryptError::DisabledException(
            DisabledException::builder().message("disabled").build(),
        );
        assert!(missing_key("alias/off", &err).is_none());
    }
}
