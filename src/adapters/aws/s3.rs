//! S3 storage backend.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;

use super::{describe, is_not_found};
use crate::ports::{ObjectStorage, StorageError};

/// Amazon S3 buckets.
pub struct S3Storage {
    client: Client,
    region: String,
}

impl S3Storage {
    /// Create from existing AWS SDK client
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        let region = config
            .region()
            .map(|r| r.as_ref().to_string())
            .unwrap_or_else(|| "us-east-1".into());
        Self::new(Client::new(config), region)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    fn provider(&self) -> &'static str {
        "S3"
    }

    async fn container_exists(&self, container: &str) -> Result<bool, StorageError> {
        match self.client.head_bucket().bucket(container).send().await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Backend(format!(
                "S3 HEAD bucket {container} failed: {}",
                describe(&e)
            ))),
        }
    }

    async fn create_container(&self, container: &str) -> Result<(), StorageError> {
        let mut request = self.client.create_bucket().bucket(container);

        // us-east-1 rejects an explicit location constraint
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request.send().await.map_err(|e| {
            StorageError::Backend(format!("S3 create bucket {container} failed: {}", describe(&e)))
        })?;
        Ok(())
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(container)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 PUT failed: {}", describe(&e))))?;
        Ok(())
    }

    async fn get_object(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    StorageError::NotFound {
                        container: container.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Backend(format!("S3 GET failed: {}", describe(&e)))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read body: {e}")))?
            .into_bytes()
            .to_vec();

        tracing::debug!("Downloaded {} bytes from s3://{container}/{key}", data.len());
        Ok(data)
    }
}
