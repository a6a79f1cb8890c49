//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the use cases of the CLI and of the remote function.

mod decryption;
mod deployment;
mod pipeline;
mod provisioning;
mod report;

pub use decryption::DecryptionHandler;
pub use deployment::{write_dockerfile, DeployReport, DeploySettings, Deployer, DOCKERFILE};
pub use pipeline::{PipelinePorts, PipelineService};
pub use provisioning::{
    placeholder_package, BlobStorageFactory, ProvisionReport, ProvisionStep, Provisioner,
};
pub use report::ReportService;
