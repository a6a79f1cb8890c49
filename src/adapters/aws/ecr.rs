//! Amazon ECR repositories and push credentials.

use async_trait::async_trait;
use aws_sdk_ecr::Client;
use base64::Engine;

use super::describe;
use crate::ports::{ContainerRegistry, RegistryAuth, RegistryError};

pub struct EcrRegistry {
    client: Client,
}

impl EcrRegistry {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

/// Split a base64 `user:password` ECR token.
fn decode_token(token: &str) -> Result<(String, String), RegistryError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .map_err(|e| RegistryError::Registry(format!("Invalid authorization token: {e}")))?;
    let text = String::from_utf8(raw)
        .map_err(|_| RegistryError::Registry("Authorization token is not UTF-8".into()))?;
    let (user, password) = text
        .split_once(':')
        .ok_or_else(|| RegistryError::Registry("Authorization token has no separator".into()))?;
    Ok((user.to_string(), password.to_string()))
}

#[async_trait]
impl ContainerRegistry for EcrRegistry {
    async fn repository_uri(&self, name: &str) -> Result<Option<String>, RegistryError> {
        match self
            .client
            .describe_repositories()
            .repository_names(name)
            .send()
            .await
        {
            Ok(response) => Ok(response
                .repositories()
                .first()
                .and_then(|r| r.repository_uri())
                .map(str::to_string)),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_repository_not_found_exception()) =>
            {
                Ok(None)
            }
            Err(e) => Err(RegistryError::Registry(format!(
                "DescribeRepositories failed: {}",
                describe(&e)
            ))),
        }
    }

    async fn create_repository(&self, name: &str) -> Result<String, RegistryError> {
        let response = self
            .client
            .create_repository()
            .repository_name(name)
            .send()
            .await
            .map_err(|e| {
                RegistryError::Registry(format!("CreateRepository failed: {}", describe(&e)))
            })?;

        response
            .repository()
            .and_then(|r| r.repository_uri())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::Registry("CreateRepository returned no URI".into()))
    }

    async fn authorization(&self) -> Result<RegistryAuth, RegistryError> {
        let response = self
            .client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| {
                RegistryError::Registry(format!("GetAuthorizationToken failed: {}", describe(&e)))
            })?;

        let data = response
            .authorization_data()
            .first()
            .ok_or_else(|| RegistryError::Registry("No authorization data returned".into()))?;
        let token = data
            .authorization_token()
            .ok_or_else(|| RegistryError::Registry("Authorization token missing".into()))?;
        let endpoint = data
            .proxy_endpoint()
            .ok_or_else(|| RegistryError::Registry("Proxy endpoint missing".into()))?;

        let (username, password) = decode_token(token)?;
        Ok(RegistryAuth {
            username,
            password,
            endpoint: endpoint.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_token() {
        let token = base64::engine::general_purpose::STANDARD.encode("AWS:s3cr3t:with-colon");
        let (user, password) = decode_token(&token).expect("decode");
        assert_eq!(user, "AWS");
        assert_eq!(password, "s3cr3t:with-colon");
    }

    #[test]
    fn test_decode_token_rejects_garbage() {
        assert!(decode_token("%%%").is_err());
        let no_sep = base64::engine::general_purpose::STANDARD.encode("nosep");
        assert!(decode_token(&no_sep).is_err());
    }
}
