//! AWS adapters: S3 storage, KMS, Lambda, ECR and STS.
//!
//! Credentials come from the standard AWS provider chain; only the region is
//! configured explicitly.

mod ecr;
mod kms;
mod lambda;
mod s3;

pub use ecr::EcrRegistry;
pub use kms::KmsKeys;
pub use lambda::LambdaFunctions;
pub use s3::S3Storage;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::error::SdkError;

/// Shared SDK configuration for every AWS client.
pub async fn load_sdk_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Account id of the caller, used to build role ARNs.
///
/// # Errors
/// Returns the STS error message.
pub async fn caller_account_id(config: &SdkConfig) -> Result<String, String> {
    let sts = aws_sdk_sts::Client::new(config);
    let identity = sts
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| format!("STS GetCallerIdentity failed: {}", describe(&e)))?;
    identity
        .account
        .ok_or_else(|| "STS returned no account id".to_string())
}

/// ARN of an IAM role in `account_id`.
#[must_use]
pub fn role_arn(account_id: &str, role_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role_name}")
}

/// Missing resource on the REST protocols (S3, Lambda), which answer 404.
fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(e) if e.raw().status().as_u16() == 404)
}

/// Readable message for an SDK error, including the service error text.
fn describe<E>(err: &SdkError<E>) -> String
where
    E: std::error::Error + 'static,
{
    match err {
        SdkError::ServiceError(e) => format!("{}", e.err()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arn() {
        assert_eq!(
            role_arn("123456789012", "LabRole"),
            "arn:aws:iam::123456789012:role/LabRole"
        );
    }
}
