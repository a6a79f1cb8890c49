//! ehrcrypt: HE vs AES benchmark over clinical data
//!
//! Main entry point for the command-line application.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ehrcrypt::adapters::aws::{self, EcrRegistry, KmsKeys, LambdaFunctions, S3Storage};
use ehrcrypt::adapters::azure::{self, ArmResourceManager, BlobStorage};
use ehrcrypt::adapters::docker::DockerCli;
use ehrcrypt::adapters::memory::{
    MemoryFunctionHost, MemoryKms, MemoryRegistry, MemoryResourceManager, MemoryStorage,
    RecordingImageBuilder,
};
use ehrcrypt::adapters::plot::PlotRenderer;
use ehrcrypt::adapters::sanitize::SanitizingMakeWriter;
use ehrcrypt::adapters::tfhe::TfheAdapter;
use ehrcrypt::application::{
    BlobStorageFactory, DecryptionHandler, DeploySettings, Deployer, PipelinePorts,
    PipelineService, Provisioner, ReportService,
};
use ehrcrypt::config::{Backend, Config};
use ehrcrypt::domain::{DecryptionStatus, RunSummary};
use ehrcrypt::ports::ObjectStorage;
use ehrcrypt::tui::App;

/// Key id of the in-memory KMS key used by the `memory` backend.
const MEMORY_KMS_KEY: &str = "memory-key";
const MEMORY_ACCOUNT: &str = "000000000000";

#[derive(Parser)]
#[command(name = "ehrcrypt")]
#[command(about = "Homomorphic vs symmetric encryption benchmark for clinical data")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./ehrcrypt.toml)
    #[arg(short, long, global = true, env = "EHRCRYPT_CONFIG")]
    config: Option<PathBuf>,

    /// Run against in-process fakes instead of AWS and Azure
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt, store, remotely decrypt and time the dataset
    Run {
        /// Skip chart and report rendering
        #[arg(long)]
        no_report: bool,
    },
    /// Render charts and the report from saved metrics
    Report {
        /// Metrics file (defaults to output.metrics_path)
        #[arg(long)]
        metrics: Option<PathBuf>,
        /// Output directory (defaults to output.report_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Browse saved metrics in the terminal
    Dashboard,
    /// Create every cloud resource a run needs
    Provision,
    /// Build, push and deploy the decryption function image
    Deploy,
}

/// Logs go to a file when the dashboard owns the terminal.
fn init_logging(force_file: bool) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_mode = std::env::var("EHRCRYPT_LOG_MODE").unwrap_or_else(|_| "auto".to_string());

    let use_file = force_file
        || match log_mode.as_str() {
            "file" => true,
            "stdout" => false,
            _ => !std::io::stdout().is_terminal(),
        };

    let (writer, guard) = if use_file {
        let log_file =
            std::env::var("EHRCRYPT_LOG_FILE").unwrap_or_else(|_| "ehrcrypt.log".to_string());

        if let Some(parent) = std::path::Path::new(&log_file)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Cannot open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = init_logging(matches!(cli.command, Commands::Dashboard))?;

    let mut config = Config::load(cli.config.as_deref())?;
    if cli.memory {
        config.backend = Backend::Memory;
    }
    tracing::debug!("Configuration: {config:?}");

    match cli.command {
        Commands::Run { no_report } => run(config, no_report).await,
        Commands::Report { metrics, out } => {
            let metrics = metrics.unwrap_or(config.output.metrics_path);
            let out = out.unwrap_or(config.output.report_dir);
            let rendered = ReportService::new(Arc::new(PlotRenderer::new()))
                .render_saved(&metrics, &out)?;
            for chart in &rendered.charts {
                println!("{}", chart.display());
            }
            if let Some(document) = rendered.document {
                println!("{}", document.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Dashboard => {
            let mut app = App::new(config.output.metrics_path, config.output.decrypted_path);
            app.run()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Provision => provision(config).await,
        Commands::Deploy => deploy(config).await,
    }
}

async fn run(mut config: Config, no_report: bool) -> Result<ExitCode> {
    let ports = match config.backend {
        Backend::Memory => memory_pipeline(&mut config),
        Backend::Cloud => cloud_pipeline(&config).await?,
    };
    config.validate_for_run()?;
    tracing::info!("Starting run on the {:?} backend", config.backend);

    let report_dir = config.output.report_dir.clone();
    let mut service = PipelineService::new(ports, config);
    let summary = service.run().await?;

    if !no_report {
        // Charts are a by-product; the metrics file is already saved.
        match ReportService::new(Arc::new(PlotRenderer::new())).render(
            service.metrics(),
            Some(&summary),
            &report_dir,
        ) {
            Ok(rendered) => {
                if let Some(document) = rendered.document {
                    tracing::info!("Report written to {}", document.display());
                }
            }
            Err(e) => tracing::error!("Report rendering failed: {e}"),
        }
    }

    print_summary(&summary, service.metrics().total());
    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(summary: &RunSummary, total_secs: f64) {
    println!("run {} ({})", summary.run_id, summary.scheme);
    if !summary.evaluation.is_none() {
        println!("  evaluation:           {}", summary.evaluation);
    }
    println!("  values encrypted:     {}", summary.values_encrypted);
    println!("  HE ciphertext bytes:  {}", summary.he_ciphertext_bytes);
    println!("  HE ciphertext entropy {:.3} bits/byte", summary.he_ciphertext_entropy);
    println!("  AES ciphertext bytes: {}", summary.aes_ciphertext_bytes);
    println!("  total timed seconds:  {total_secs:.4}");
    match &summary.decryption {
        DecryptionStatus::Verified { compared } => {
            println!("  remote decryption:    verified {compared} value(s)");
        }
        DecryptionStatus::Mismatch { mismatches } => {
            println!("  remote decryption:    {mismatches} mismatching value(s)");
        }
        DecryptionStatus::RemoteError { message } => {
            println!("  remote decryption:    error: {message}");
        }
    }
}

/// In-process services; the decryption function reads the same fake S3.
fn memory_pipeline(config: &mut Config) -> PipelinePorts {
    let kms = MemoryKms::new().with_key(MEMORY_KMS_KEY, &config.aws.kms_key_description);
    if config.aws.kms_key_id.is_none() {
        config.aws.kms_key_id = Some(MEMORY_KMS_KEY.to_string());
    }

    let he = Arc::new(TfheAdapter::new());
    let s3 = Arc::new(MemoryStorage::new("S3").with_container(&config.aws.bucket));
    let handler = Arc::new(DecryptionHandler::new(s3.clone(), he.clone()));
    let functions = MemoryFunctionHost::new().with_function(&config.aws.function_name, handler);

    PipelinePorts {
        he,
        s3,
        azure: Arc::new(MemoryStorage::ensuring_containers("Azure Blob")),
        kms: Arc::new(kms),
        functions: Arc::new(functions),
    }
}

async fn cloud_pipeline(config: &Config) -> Result<PipelinePorts> {
    let sdk = aws::load_sdk_config(&config.aws.region).await;
    Ok(PipelinePorts {
        he: Arc::new(TfheAdapter::new()),
        s3: Arc::new(S3Storage::from_config(&sdk)),
        azure: azure_blob(config)?,
        kms: Arc::new(KmsKeys::from_config(&sdk)),
        functions: Arc::new(LambdaFunctions::from_config(&sdk)),
    })
}

fn azure_blob(config: &Config) -> Result<Arc<dyn ObjectStorage>> {
    let account = config.azure.storage_account.clone();
    let storage = match &config.azure.access_key {
        Some(key) => BlobStorage::with_access_key(account, key.clone()),
        None => {
            let credential = azure::default_credential().map_err(|e| anyhow!(e))?;
            BlobStorage::with_token_credential(account, credential)
        }
    };
    Ok(Arc::new(storage))
}

async fn role_arn(config: &Config, sdk: &aws_config::SdkConfig) -> Result<String> {
    let account = aws::caller_account_id(sdk).await.map_err(|e| anyhow!(e))?;
    Ok(aws::role_arn(&account, &config.aws.role_name))
}

async fn provision(config: Config) -> Result<ExitCode> {
    config.validate_for_provision()?;

    let provisioner = match config.backend {
        Backend::Memory => {
            let blob = Arc::new(MemoryStorage::ensuring_containers("Azure Blob"));
            let factory: BlobStorageFactory =
                Box::new(move |_account: &str, _key: String| blob.clone() as Arc<dyn ObjectStorage>);
            let role = aws::role_arn(MEMORY_ACCOUNT, &config.aws.role_name);
            Provisioner::new(
                Arc::new(MemoryResourceManager::new()),
                factory,
                Arc::new(MemoryStorage::new("S3")),
                Arc::new(MemoryFunctionHost::new()),
                Arc::new(MemoryKms::new()),
                role,
                config,
            )
        }
        Backend::Cloud => {
            let sdk = aws::load_sdk_config(&config.aws.region).await;
            let role = role_arn(&config, &sdk).await?;
            let subscription = config
                .azure
                .subscription_id
                .clone()
                .ok_or_else(|| anyhow!("azure.subscription_id is not set"))?;
            let credential = azure::default_credential().map_err(|e| anyhow!(e))?;
            let factory: BlobStorageFactory = Box::new(|account: &str, key: String| {
                Arc::new(BlobStorage::with_access_key(account.to_string(), key))
                    as Arc<dyn ObjectStorage>
            });
            Provisioner::new(
                Arc::new(ArmResourceManager::new(credential, subscription)),
                factory,
                Arc::new(S3Storage::from_config(&sdk)),
                Arc::new(LambdaFunctions::from_config(&sdk)),
                Arc::new(KmsKeys::from_config(&sdk)),
                role,
                config,
            )
        }
    };

    let report = provisioner.provision().await?;
    for step in &report.steps {
        println!("{:<48} {}", step.resource, step.outcome);
    }
    println!("{} resource(s) created", report.created());
    println!("export EHRCRYPT_AWS__KMS_KEY_ID={}", report.kms_key_id);
    Ok(ExitCode::SUCCESS)
}

async fn deploy(config: Config) -> Result<ExitCode> {
    let deployer = match config.backend {
        Backend::Memory => Deployer::new(
            Arc::new(MemoryRegistry::new()),
            Arc::new(RecordingImageBuilder::new()),
            Arc::new(MemoryFunctionHost::new()),
            DeploySettings::from_config(&config, aws::role_arn(MEMORY_ACCOUNT, &config.aws.role_name)),
        ),
        Backend::Cloud => {
            let sdk = aws::load_sdk_config(&config.aws.region).await;
            let role = role_arn(&config, &sdk).await?;
            Deployer::new(
                Arc::new(EcrRegistry::from_config(&sdk)),
                Arc::new(DockerCli::default()),
                Arc::new(LambdaFunctions::from_config(&sdk)),
                DeploySettings::from_config(&config, role),
            )
        }
    };

    let report = deployer.deploy().await?;
    println!(
        "Deployed {} from {} (attempt {})",
        config.aws.function_name, report.image_uri, report.attempts
    );
    Ok(ExitCode::SUCCESS)
}
