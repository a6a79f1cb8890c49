//! Deployment of the decryption function as a container image.
//!
//! 1. Ensure the registry repository exists
//! 2. Write the Dockerfile into the build context
//! 3. Log in, build and push `<repository_uri>:<tag>`
//! 4. Recreate the function from the image, retrying with a fixed delay

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::ports::{
    ContainerRegistry, FunctionCode, FunctionDefinition, ImageBuilder, RemoteFunction,
};
use crate::{PipelineError, Result};

/// Builds `decrypt_handler` on Amazon Linux and installs it as the
/// `provided.al2023` bootstrap.
pub const DOCKERFILE: &str = r#"FROM public.ecr.aws/amazonlinux/amazonlinux:2023 AS build
RUN dnf install -y gcc gcc-c++ make cmake tar gzip \
    && curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y --profile minimal
ENV PATH="/root/.cargo/bin:${PATH}"
WORKDIR /src
COPY Cargo.toml Cargo.lock* ./
COPY src ./src
RUN cargo build --release --bin decrypt_handler

FROM public.ecr.aws/lambda/provided:al2023
COPY --from=build /src/target/release/decrypt_handler ${LAMBDA_RUNTIME_DIR}/bootstrap
CMD ["decrypt_handler"]
"#;

/// Inputs for one deployment.
#[derive(Debug, Clone)]
pub struct DeploySettings {
    pub repository: String,
    pub function_name: String,
    pub role_arn: String,
    pub image_tag: String,
    pub platform: String,
    pub build_context: PathBuf,
    pub timeout_secs: i32,
    pub memory_mb: i32,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub delete_wait: Duration,
}

impl DeploySettings {
    pub fn from_config(config: &Config, role_arn: impl Into<String>) -> Self {
        Self {
            repository: config.aws.ecr_repository.clone(),
            function_name: config.aws.function_name.clone(),
            role_arn: role_arn.into(),
            image_tag: config.deploy.image_tag.clone(),
            platform: config.deploy.platform.clone(),
            build_context: config.deploy.build_context.clone(),
            timeout_secs: config.deploy.timeout_secs,
            memory_mb: config.deploy.memory_mb,
            max_attempts: config.deploy.max_attempts,
            retry_delay: Duration::from_secs(config.deploy.retry_delay_secs),
            delete_wait: Duration::from_secs(config.deploy.delete_wait_secs),
        }
    }
}

/// Result of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub image_uri: String,
    /// Attempt that created the function (1-based).
    pub attempts: u32,
}

pub struct Deployer {
    registry: Arc<dyn ContainerRegistry>,
    builder: Arc<dyn ImageBuilder>,
    functions: Arc<dyn RemoteFunction>,
    settings: DeploySettings,
}

impl Deployer {
    pub fn new(
        registry: Arc<dyn ContainerRegistry>,
        builder: Arc<dyn ImageBuilder>,
        functions: Arc<dyn RemoteFunction>,
        settings: DeploySettings,
    ) -> Self {
        Self {
            registry,
            builder,
            functions,
            settings,
        }
    }

    /// Build, push and (re)create the function.
    ///
    /// # Errors
    /// Registry and build failures are returned immediately; function
    /// creation failures only after the last attempt, as
    /// `PipelineError::DeploymentExhausted`.
    pub async fn deploy(&self) -> Result<DeployReport> {
        let repository_uri = self.ensure_repository().await?;
        let image_uri = format!("{repository_uri}:{}", self.settings.image_tag);

        let dockerfile = write_dockerfile(&self.settings.build_context)?;
        tracing::info!("Dockerfile written to {}", dockerfile.display());

        let auth = self.registry.authorization().await?;
        self.builder.login(&auth).await?;
        self.builder
            .build(&self.settings.build_context, &image_uri, &self.settings.platform)
            .await?;
        self.builder.push(&image_uri).await?;
        tracing::info!("Pushed {image_uri}");

        let attempts = self.recreate_function(&image_uri).await?;
        Ok(DeployReport {
            image_uri,
            attempts,
        })
    }

    async fn ensure_repository(&self) -> Result<String> {
        let name = &self.settings.repository;
        if let Some(uri) = self.registry.repository_uri(name).await? {
            tracing::info!("Repository {name} already exists");
            return Ok(uri);
        }
        let uri = self.registry.create_repository(name).await?;
        tracing::info!("Repository {name} created");
        Ok(uri)
    }

    async fn recreate_function(&self, image_uri: &str) -> Result<u32> {
        let definition = FunctionDefinition {
            name: self.settings.function_name.clone(),
            role_arn: self.settings.role_arn.clone(),
            code: FunctionCode::Image(image_uri.to_string()),
            runtime: None,
            handler: None,
            timeout_secs: self.settings.timeout_secs,
            memory_mb: self.settings.memory_mb,
        };
        let max_attempts = self.settings.max_attempts.max(1);

        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            tracing::info!(
                "Deploying {} (attempt {attempt}/{max_attempts})",
                definition.name
            );
            match self.try_create(&definition).await {
                Ok(()) => {
                    tracing::info!("Function {} deployed", definition.name);
                    return Ok(attempt);
                }
                Err(e) => {
                    tracing::warn!("Attempt {attempt} failed: {e}");
                    last_error = e.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!("Deployment of {} failed after {max_attempts} attempts", definition.name);
        Err(PipelineError::DeploymentExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    async fn try_create(&self, definition: &FunctionDefinition) -> Result<()> {
        if self.functions.delete_function(&definition.name).await? {
            tracing::info!(
                "Deleted existing function {}, waiting {:?}",
                definition.name,
                self.settings.delete_wait
            );
            tokio::time::sleep(self.settings.delete_wait).await;
        }
        self.functions.create_function(definition).await?;
        Ok(())
    }
}

/// Write [`DOCKERFILE`] into `context`, replacing any existing one.
///
/// # Errors
/// Returns an IO error if the file cannot be written.
pub fn write_dockerfile(context: &Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(context)?;
    let path = context.join("Dockerfile");
    std::fs::write(&path, DOCKERFILE)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryFunctionHost, MemoryRegistry, RecordingImageBuilder};

    struct Fixture {
        dir: tempfile::TempDir,
        registry: Arc<MemoryRegistry>,
        builder: Arc<RecordingImageBuilder>,
        functions: Arc<MemoryFunctionHost>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().expect("tempdir"),
                registry: Arc::new(MemoryRegistry::new()),
                builder: Arc::new(RecordingImageBuilder::new()),
                functions: Arc::new(MemoryFunctionHost::new()),
            }
        }

        fn deployer(&self, max_attempts: u32) -> Deployer {
            let mut config = Config::default();
            config.deploy.build_context = self.dir.path().to_path_buf();
            config.deploy.max_attempts = max_attempts;
            config.deploy.retry_delay_secs = 0;
            config.deploy.delete_wait_secs = 0;
            Deployer::new(
                self.registry.clone(),
                self.builder.clone(),
                self.functions.clone(),
                DeploySettings::from_config(&config, "arn:aws:iam::000000000000:role/LabRole"),
            )
        }
    }

    #[tokio::test]
    async fn test_deploy_builds_pushes_and_creates() {
        let fx = Fixture::new();
        let report = fx.deployer(3).deploy().await.expect("deploy");

        assert_eq!(
            report.image_uri,
            "000000000000.dkr.ecr.local.amazonaws.com/tseal-lambda:latest"
        );
        assert_eq!(report.attempts, 1);
        assert_eq!(
            fx.builder.calls(),
            vec![
                "login".to_string(),
                format!("build {}", report.image_uri),
                format!("push {}", report.image_uri),
            ]
        );
        assert!(fx.dir.path().join("Dockerfile").exists());

        let definition = fx.functions.definition("EncryptedEHRLambda").expect("function");
        assert_eq!(definition.code, FunctionCode::Image(report.image_uri.clone()));
        assert_eq!(definition.memory_mb, 1024);
        assert_eq!(definition.timeout_secs, 60);
    }

    #[tokio::test]
    async fn test_redeploy_replaces_function_and_reuses_repository() {
        let fx = Fixture::new();
        fx.deployer(3).deploy().await.expect("deploy");
        fx.deployer(3).deploy().await.expect("redeploy");

        assert_eq!(fx.registry.repository_count(), 1);
        assert_eq!(fx.functions.delete_count(), 1);
        assert_eq!(fx.functions.create_count(), 2);
        assert!(fx.functions.function_exists("EncryptedEHRLambda").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let fx = Fixture::new();
        fx.functions.fail_next_creates(2);
        let report = fx.deployer(3).deploy().await.expect("deploy");

        assert_eq!(report.attempts, 3);
        assert_eq!(fx.functions.create_count(), 1);
    }

    #[tokio::test]
    async fn test_last_failure_is_terminal() {
        let fx = Fixture::new();
        fx.functions.fail_next_creates(5);
        let result = fx.deployer(2).deploy().await;

        match result {
            Err(PipelineError::DeploymentExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 2);
                assert!(last_error.contains("Simulated failure"));
            }
            other => panic!("expected exhausted deployment, got {other:?}"),
        }
        assert_eq!(fx.functions.create_count(), 0);
    }

    #[test]
    fn test_dockerfile_installs_bootstrap() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_dockerfile(&dir.path().join("ctx")).expect("write");
        let contents = std::fs::read_to_string(path).expect("read");

        assert!(contents.contains("--bin decrypt_handler"));
        assert!(contents.contains("${LAMBDA_RUNTIME_DIR}/bootstrap"));
    }
}
