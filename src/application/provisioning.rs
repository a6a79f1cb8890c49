//! Provisioning: idempotent setup of every cloud resource a run touches.
//!
//! Each step checks for the resource first and creates it only when
//! missing, so running provisioning twice creates nothing the second time.

use std::io::Write;
use std::sync::Arc;

use crate::config::Config;
use crate::ports::{
    FunctionCode, FunctionDefinition, KeyManagement, ObjectStorage, Provisioned, RemoteFunction,
    ResourceManager,
};
use crate::Result;

/// Source of the placeholder function deployed until the real image exists.
const PLACEHOLDER_SOURCE: &str = r#"def lambda_handler(event, context):
    return {"statusCode": 200, "body": "Placeholder function ran successfully"}
"#;
const PLACEHOLDER_FILE: &str = "lambda_function.py";
const PLACEHOLDER_RUNTIME: &str = "python3.12";
const PLACEHOLDER_HANDLER: &str = "lambda_function.lambda_handler";
const PLACEHOLDER_TIMEOUT_SECS: i32 = 300;
const PLACEHOLDER_MEMORY_MB: i32 = 128;

/// Builds blob storage for an account once its key is known.
pub type BlobStorageFactory =
    Box<dyn Fn(&str, String) -> Arc<dyn ObjectStorage> + Send + Sync>;

/// Outcome of one provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionStep {
    pub resource: String,
    pub outcome: Provisioned,
}

/// Everything provisioning did.
#[derive(Debug, Clone, Default)]
pub struct ProvisionReport {
    pub steps: Vec<ProvisionStep>,
    /// Id of the KMS key to put into `aws.kms_key_id`.
    pub kms_key_id: String,
}

impl ProvisionReport {
    /// Number of resources created by this invocation.
    #[must_use]
    pub fn created(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == Provisioned::Created)
            .count()
    }

    fn push(&mut self, resource: String, outcome: Provisioned) {
        tracing::info!("{resource}: {outcome}");
        self.steps.push(ProvisionStep { resource, outcome });
    }
}

/// Zip archive holding the placeholder function.
///
/// # Errors
/// Returns an IO error if the archive cannot be written.
pub fn placeholder_package() -> std::io::Result<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);
    writer
        .start_file(PLACEHOLDER_FILE, options)
        .map_err(std::io::Error::other)?;
    writer.write_all(PLACEHOLDER_SOURCE.as_bytes())?;
    let cursor = writer.finish().map_err(std::io::Error::other)?;
    Ok(cursor.into_inner())
}

pub struct Provisioner {
    resources: Arc<dyn ResourceManager>,
    blob_storage: BlobStorageFactory,
    s3: Arc<dyn ObjectStorage>,
    functions: Arc<dyn RemoteFunction>,
    kms: Arc<dyn KeyManagement>,
    role_arn: String,
    config: Config,
}

impl Provisioner {
    pub fn new(
        resources: Arc<dyn ResourceManager>,
        blob_storage: BlobStorageFactory,
        s3: Arc<dyn ObjectStorage>,
        functions: Arc<dyn RemoteFunction>,
        kms: Arc<dyn KeyManagement>,
        role_arn: impl Into<String>,
        config: Config,
    ) -> Self {
        Self {
            resources,
            blob_storage,
            s3,
            functions,
            kms,
            role_arn: role_arn.into(),
            config,
        }
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the failing step's error.
    pub async fn provision(&self) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();
        let azure = &self.config.azure;
        let aws = &self.config.aws;

        let outcome = if self.resources.resource_group_exists(&azure.resource_group).await? {
            Provisioned::AlreadyExists
        } else {
            self.resources
                .create_resource_group(&azure.resource_group, &azure.location)
                .await?;
            Provisioned::Created
        };
        report.push(format!("Azure resource group {}", azure.resource_group), outcome);

        let outcome = if self
            .resources
            .storage_account_exists(&azure.resource_group, &azure.storage_account)
            .await?
        {
            Provisioned::AlreadyExists
        } else {
            self.resources
                .create_storage_account(&azure.resource_group, &azure.storage_account, &azure.location)
                .await?;
            Provisioned::Created
        };
        report.push(format!("Azure storage account {}", azure.storage_account), outcome);

        let account_key = self
            .resources
            .storage_account_key(&azure.resource_group, &azure.storage_account)
            .await?;
        let blob = (self.blob_storage)(&azure.storage_account, account_key);
        let outcome = blob.ensure_container(&azure.container).await?;
        report.push(format!("Azure blob container {}", azure.container), outcome);

        let outcome = self.s3.ensure_container(&aws.bucket).await?;
        report.push(format!("S3 bucket {}", aws.bucket), outcome);

        let outcome = if self.functions.function_exists(&aws.function_name).await? {
            Provisioned::AlreadyExists
        } else {
            let definition = FunctionDefinition {
                name: aws.function_name.clone(),
                role_arn: self.role_arn.clone(),
                code: FunctionCode::Zip(placeholder_package()?),
                runtime: Some(PLACEHOLDER_RUNTIME.into()),
                handler: Some(PLACEHOLDER_HANDLER.into()),
                timeout_secs: PLACEHOLDER_TIMEOUT_SECS,
                memory_mb: PLACEHOLDER_MEMORY_MB,
            };
            self.functions.create_function(&definition).await?;
            Provisioned::Created
        };
        report.push(format!("Lambda function {}", aws.function_name), outcome);

        let (key_id, outcome) = match self
            .kms
            .find_key_by_description(&aws.kms_key_description)
            .await?
        {
            Some(id) => (id, Provisioned::AlreadyExists),
            None => (
                self.kms.create_key(&aws.kms_key_description).await?,
                Provisioned::Created,
            ),
        };
        report.push(format!("KMS key {key_id}"), outcome);
        report.kms_key_id = key_id;

        tracing::info!(
            "Azure function {} is not deployed automatically; publish it with `func azure functionapp publish {}`",
            azure.function_name,
            azure.function_name
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryFunctionHost, MemoryKms, MemoryResourceManager, MemoryStorage};
    use std::io::Read;
    use std::sync::Mutex;

    struct Fixture {
        provisioner: Provisioner,
        blob: Arc<MemoryStorage>,
        keys_seen: Arc<Mutex<Vec<String>>>,
        s3: Arc<MemoryStorage>,
        functions: Arc<MemoryFunctionHost>,
        kms: Arc<MemoryKms>,
    }

    fn fixture() -> Fixture {
        let blob = Arc::new(MemoryStorage::ensuring_containers("Azure Blob"));
        let keys_seen = Arc::new(Mutex::new(Vec::new()));
        let factory: BlobStorageFactory = {
            let blob = blob.clone();
            let keys_seen = keys_seen.clone();
            Box::new(move |_account: &str, key: String| {
                keys_seen.lock().expect("lock").push(key);
                blob.clone() as Arc<dyn ObjectStorage>
            })
        };
        let s3 = Arc::new(MemoryStorage::new("S3"));
        let functions = Arc::new(MemoryFunctionHost::new());
        let kms = Arc::new(MemoryKms::new());

        let provisioner = Provisioner::new(
            Arc::new(MemoryResourceManager::new()),
            factory,
            s3.clone(),
            functions.clone(),
            kms.clone(),
            "arn:aws:iam::000000000000:role/LabRole",
            Config::default(),
        );
        Fixture {
            provisioner,
            blob,
            keys_seen,
            s3,
            functions,
            kms,
        }
    }

    #[tokio::test]
    async fn test_first_run_creates_everything() {
        let fx = fixture();
        let report = fx.provisioner.provision().await.expect("provision");
        let config = Config::default();

        assert_eq!(report.steps.len(), 6);
        assert_eq!(report.created(), 6);
        assert!(fx.blob.container_exists(&config.azure.container).await.expect("exists"));
        assert!(fx.s3.container_exists(&config.aws.bucket).await.expect("exists"));
        assert_eq!(fx.kms.key_count(), 1);
        assert_eq!(
            fx.keys_seen.lock().expect("lock").as_slice(),
            [format!("{}-key", config.azure.storage_account)]
        );

        let definition = fx
            .functions
            .definition(&config.aws.function_name)
            .expect("function");
        assert_eq!(definition.runtime.as_deref(), Some(PLACEHOLDER_RUNTIME));
        assert_eq!(definition.timeout_secs, 300);
        assert!(matches!(definition.code, FunctionCode::Zip(_)));
    }

    #[tokio::test]
    async fn test_second_run_creates_nothing() {
        let fx = fixture();
        let first = fx.provisioner.provision().await.expect("provision");
        let second = fx.provisioner.provision().await.expect("provision");

        assert_eq!(second.created(), 0);
        assert!(second
            .steps
            .iter()
            .all(|s| s.outcome == Provisioned::AlreadyExists));
        assert_eq!(first.kms_key_id, second.kms_key_id);
        assert_eq!(fx.functions.create_count(), 1);
        assert_eq!(fx.kms.key_count(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_stops_provisioning() {
        let fx = fixture();
        fx.s3.set_unavailable(true);

        assert!(fx.provisioner.provision().await.is_err());
        assert_eq!(fx.functions.create_count(), 0);
        assert_eq!(fx.kms.key_count(), 0);
    }

    #[test]
    fn test_placeholder_package_contents() {
        let bytes = placeholder_package().expect("zip");
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).expect("archive");
        let mut source = String::new();
        archive
            .by_name(PLACEHOLDER_FILE)
            .expect("entry")
            .read_to_string(&mut source)
            .expect("read");
        assert!(source.contains("def lambda_handler(event, context):"));
    }
}
