//! # ehrcrypt
//!
//! Homomorphic vs. symmetric encryption benchmark for clinical data.
//!
//! This crate provides:
//! - HE encryption of a label-encoded clinical column (tfhe-rs)
//! - Storage of ciphertext and context in S3 and Azure Blob
//! - Remote decryption through an AWS Lambda function
//! - An AES-256-GCM comparison branch with KMS key wrapping
//! - Per-stage timing metrics, charts, a printable report and a terminal dashboard
//! - Idempotent provisioning and container-image deployment of the cloud side
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (encryption context, metrics, invocation payloads)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (tfhe-rs, AWS, Azure, plotters, in-memory)
//! - `application`: Use cases orchestrating domain and ports
//! - `tui`: Terminal dashboard

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod tui;

pub use config::Config;
pub use domain::{CryptoError, EncryptionContext, HeScheme, MetricsRecord};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(#[from] domain::CryptoError),

    #[error("Symmetric cipher failed: {0}")]
    Symmetric(#[from] domain::SymmetricError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] domain::DatasetError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] ports::StorageError),

    #[error("Key management failed: {0}")]
    Kms(#[from] ports::KmsError),

    #[error("Remote function error: {0}")]
    Function(#[from] ports::FunctionError),

    #[error("Remote decryption failed: {0}")]
    Invocation(#[from] domain::InvocationError),

    #[error("Registry error: {0}")]
    Registry(#[from] ports::RegistryError),

    #[error("Resource manager error: {0}")]
    Resource(#[from] ports::ResourceError),

    #[error("Report error: {0}")]
    Report(#[from] ports::ReportError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] domain::MetricsError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Deployment failed after {attempts} attempt(s): {last_error}")]
    DeploymentExhausted { attempts: u32, last_error: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
