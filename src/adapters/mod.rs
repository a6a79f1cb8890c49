//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `tfhe`: tfhe-rs for HE operations
//! - `aws`: S3, KMS, Lambda, ECR and STS clients
//! - `azure`: Blob storage and Resource Manager
//! - `csv`: dataset loading
//! - `docker`: image builds through the docker CLI
//! - `memory`: in-process stand-ins for every cloud port
//! - `plot`: charts and the printable report
//! - `sanitize`: secret filtering for logs

pub mod aws;
pub mod azure;
pub mod csv;
pub mod docker;
pub mod memory;
pub mod plot;
pub mod sanitize;
pub mod tfhe;
