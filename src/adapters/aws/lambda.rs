//! AWS Lambda function host.

use async_trait::async_trait;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::{FunctionCode as LambdaCode, InvocationType, PackageType, Runtime};
use aws_sdk_lambda::Client;

use super::{describe, is_not_found};
use crate::ports::{FunctionCode, FunctionDefinition, FunctionError, RawInvocation, RemoteFunction};

pub struct LambdaFunctions {
    client: Client,
}

impl LambdaFunctions {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl RemoteFunction for LambdaFunctions {
    async fn invoke(&self, name: &str, payload: Vec<u8>) -> Result<RawInvocation, FunctionError> {
        let response = self
            .client
            .invoke()
            .function_name(name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    FunctionError::NotFound(name.to_string())
                } else {
                    FunctionError::Invoke {
                        name: name.to_string(),
                        message: describe(&e),
                    }
                }
            })?;

        let status_code = u16::try_from(response.status_code()).unwrap_or(0);
        if let Some(kind) = response.function_error() {
            tracing::warn!("Lambda {name} reported a function error: {kind}");
        }

        Ok(RawInvocation {
            status_code,
            payload: response.payload().map(|p| p.as_ref().to_vec()),
            function_error: response.function_error().map(str::to_string),
        })
    }

    async fn function_exists(&self, name: &str) -> Result<bool, FunctionError> {
        match self.client.get_function().function_name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(FunctionError::Management(format!(
                "GetFunction {name} failed: {}",
                describe(&e)
            ))),
        }
    }

    async fn create_function(&self, definition: &FunctionDefinition) -> Result<(), FunctionError> {
        let mut request = self
            .client
            .create_function()
            .function_name(&definition.name)
            .role(&definition.role_arn)
            .timeout(definition.timeout_secs)
            .memory_size(definition.memory_mb)
            .publish(true);

        request = match &definition.code {
            FunctionCode::Zip(bytes) => request
                .package_type(PackageType::Zip)
                .code(LambdaCode::builder().zip_file(Blob::new(bytes.clone())).build())
                .set_runtime(definition.runtime.as_deref().map(Runtime::from))
                .set_handler(definition.handler.clone()),
            FunctionCode::Image(uri) => request
                .package_type(PackageType::Image)
                .code(LambdaCode::builder().image_uri(uri).build()),
        };

        request.send().await.map_err(|e| {
            FunctionError::Management(format!(
                "CreateFunction {} failed: {}",
                definition.name,
                describe(&e)
            ))
        })?;
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> Result<bool, FunctionError> {
        match self.client.delete_function().function_name(name).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(FunctionError::Management(format!(
                "DeleteFunction {name} failed: {}",
                describe(&e)
            ))),
        }
    }
}
