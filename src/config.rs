//! Runtime configuration.
//!
//! Loaded from `ehrcrypt.toml` and overridden by `EHRCRYPT_*` environment
//! variables, nested keys separated by `__` (`EHRCRYPT_AWS__KMS_KEY_ID`).
//! Credentials never have defaults.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::domain::{Evaluation, HeScheme};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "ehrcrypt.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "EHRCRYPT_";

/// Errors while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("Missing required setting(s): {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Which adapters the pipeline runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// AWS and Azure SDK adapters.
    #[default]
    Cloud,
    /// In-process fakes of every cloud service.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: Backend,
    pub dataset: DatasetConfig,
    pub he: HeConfig,
    pub aws: AwsConfig,
    pub azure: AzureConfig,
    pub objects: ObjectKeys,
    pub output: OutputConfig,
    pub deploy: DeployConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub category_column: String,
    /// Maximum number of values encrypted per run.
    pub max_values: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("DRGCODES.csv"),
            category_column: "drg_type".into(),
            max_values: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    #[default]
    Approximate,
    Exact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeConfig {
    pub scheme: SchemeKind,
    /// Fixed-point scale for the approximate scheme.
    pub scale_bits: u32,
    /// Homomorphic step the decryption function runs before decrypting.
    pub evaluate: Evaluation,
}

impl Default for HeConfig {
    fn default() -> Self {
        Self {
            scheme: SchemeKind::Approximate,
            scale_bits: HeScheme::DEFAULT_SCALE_BITS,
            evaluate: Evaluation::None,
        }
    }
}

impl HeConfig {
    #[must_use]
    pub fn scheme(&self) -> HeScheme {
        match self.scheme {
            SchemeKind::Approximate => HeScheme::Approximate {
                scale_bits: self.scale_bits,
            },
            SchemeKind::Exact => HeScheme::Exact,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub bucket: String,
    pub function_name: String,
    /// Key id or ARN used for wrapping. Required for `run`.
    pub kms_key_id: Option<String>,
    /// Description used to find or create the key during provisioning.
    pub kms_key_description: String,
    /// IAM role the function executes as.
    pub role_name: String,
    pub ecr_repository: String,
    /// Also wrap a placeholder HE key through KMS so both branches report a
    /// KMS stage.
    pub wrap_placeholder_he_key: bool,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".into(),
            bucket: "secure-ehr-bucket".into(),
            function_name: "EncryptedEHRLambda".into(),
            kms_key_id: None,
            kms_key_description: "Key for metadata encryption".into(),
            role_name: "LabRole".into(),
            ecr_repository: "tseal-lambda".into(),
            wrap_placeholder_he_key: true,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    /// Required for `provision`.
    pub subscription_id: Option<String>,
    pub resource_group: String,
    pub location: String,
    pub storage_account: String,
    pub container: String,
    /// Shared key for blob access. Falls back to Azure identity when unset.
    pub access_key: Option<String>,
    pub function_name: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            resource_group: "SecureAnalyticsRG".into(),
            location: "eastus".into(),
            storage_account: "secureehrstorage123".into(),
            container: "secure-ehr-container".into(),
            access_key: None,
            function_name: "EncryptedQueryFunction".into(),
        }
    }
}

impl std::fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureConfig")
            .field("subscription_id", &self.subscription_id)
            .field("resource_group", &self.resource_group)
            .field("location", &self.location)
            .field("storage_account", &self.storage_account)
            .field("container", &self.container)
            .field("access_key", &self.access_key.as_ref().map(|_| "[REDACTED]"))
            .field("function_name", &self.function_name)
            .finish()
    }
}

/// Object names used in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectKeys {
    pub he_payload: String,
    pub context: String,
    pub aes_payload: String,
}

impl Default for ObjectKeys {
    fn default() -> Self {
        Self {
            he_payload: "encrypted_data_HE.json".into(),
            context: "seal_context.bin".into(),
            aes_payload: "encrypted_data_AES.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub metrics_path: PathBuf,
    pub decrypted_path: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            metrics_path: PathBuf::from("encryption_metrics.json"),
            decrypted_path: PathBuf::from("decrypted_HE.json"),
            report_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
    pub delete_wait_secs: u64,
    pub timeout_secs: i32,
    pub memory_mb: i32,
    pub image_tag: String,
    pub platform: String,
    /// Directory used as the docker build context.
    pub build_context: PathBuf,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_secs: 15,
            delete_wait_secs: 10,
            timeout_secs: 60,
            memory_mb: 1024,
            image_tag: "latest".into(),
            platform: "linux/amd64".into(),
            build_context: PathBuf::from("."),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Cloud,
            dataset: DatasetConfig::default(),
            he: HeConfig::default(),
            aws: AwsConfig::default(),
            azure: AzureConfig::default(),
            objects: ObjectKeys::default(),
            output: OutputConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` (or `ehrcrypt.toml`) merged with the environment.
    ///
    /// A missing file is not an error; defaults and environment apply.
    ///
    /// # Errors
    /// Returns `ConfigError::Load` for malformed input.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::figment(path).extract().map_err(|e| Box::new(e).into())
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check settings `run` needs.
    ///
    /// # Errors
    /// Lists every missing setting at once.
    pub fn validate_for_run(&self) -> Result<(), ConfigError> {
        self.check_common()?;
        if self.backend == Backend::Cloud && self.aws.kms_key_id.is_none() {
            return Err(ConfigError::Missing(vec!["aws.kms_key_id"]));
        }
        Ok(())
    }

    /// Check settings `provision` needs.
    ///
    /// # Errors
    /// Lists every missing setting at once.
    pub fn validate_for_provision(&self) -> Result<(), ConfigError> {
        self.check_common()?;
        if self.backend == Backend::Cloud && self.azure.subscription_id.is_none() {
            return Err(ConfigError::Missing(vec!["azure.subscription_id"]));
        }
        Ok(())
    }

    fn check_common(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();
        if self.aws.bucket.is_empty() {
            missing.push("aws.bucket");
        }
        if self.aws.function_name.is_empty() {
            missing.push("aws.function_name");
        }
        if self.azure.container.is_empty() {
            missing.push("azure.container");
        }
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        if self.dataset.max_values == 0 {
            return Err(ConfigError::Invalid {
                key: "dataset.max_values",
                message: "must be at least 1".into(),
            });
        }
        if self.he.scheme == SchemeKind::Approximate && !(1..=40).contains(&self.he.scale_bits) {
            return Err(ConfigError::Invalid {
                key: "he.scale_bits",
                message: format!("{} is outside 1..=40", self.he.scale_bits),
            });
        }
        if self.deploy.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "deploy.max_attempts",
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_match_resource_names() {
        let config = Config::default();
        assert_eq!(config.aws.bucket, "secure-ehr-bucket");
        assert_eq!(config.aws.function_name, "EncryptedEHRLambda");
        assert_eq!(config.azure.container, "secure-ehr-container");
        assert_eq!(config.objects.context, "seal_context.bin");
        assert_eq!(config.deploy.max_attempts, 3);
        assert_eq!(config.he.scheme(), HeScheme::approximate());
        assert_eq!(config.he.evaluate, Evaluation::None);
    }

    #[test]
    fn test_file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ehrcrypt.toml",
                r#"
                    backend = "memory"

                    [aws]
                    bucket = "from-file"

                    [he]
                    scheme = "exact"
                "#,
            )?;
            jail.set_env("EHRCRYPT_AWS__KMS_KEY_ID", "alias/test");
            jail.set_env("EHRCRYPT_DATASET__MAX_VALUES", "7");
            jail.set_env("EHRCRYPT_HE__EVALUATE", "square");

            let config = Config::load(None).expect("load");
            assert_eq!(config.backend, Backend::Memory);
            assert_eq!(config.aws.bucket, "from-file");
            assert_eq!(config.aws.kms_key_id.as_deref(), Some("alias/test"));
            assert_eq!(config.dataset.max_values, 7);
            assert_eq!(config.he.scheme(), HeScheme::Exact);
            assert_eq!(config.he.evaluate, Evaluation::Square);
            assert_eq!(config.aws.region, "us-east-1");
            Ok(())
        });
    }

    #[test]
    fn test_cloud_run_requires_kms_key() {
        let config = Config::default();
        assert!(matches!(
            config.validate_for_run(),
            Err(ConfigError::Missing(keys)) if keys == vec!["aws.kms_key_id"]
        ));

        let memory = Config {
            backend: Backend::Memory,
            ..Config::default()
        };
        assert!(memory.validate_for_run().is_ok());
    }

    #[test]
    fn test_invalid_scale_bits() {
        let mut config = Config {
            backend: Backend::Memory,
            ..Config::default()
        };
        config.he.scale_bits = 60;
        assert!(matches!(
            config.validate_for_run(),
            Err(ConfigError::Invalid { key: "he.scale_bits", .. })
        ));
    }

    #[test]
    fn test_access_key_redacted_in_debug() {
        let mut config = AzureConfig::default();
        config.access_key = Some("c2VjcmV0LWtleQ==".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("c2VjcmV0"));
        assert!(debug.contains("[REDACTED]"));
    }
}
