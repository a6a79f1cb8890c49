//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the pipeline and external systems (HE library, cloud storage,
//! KMS, function hosts, registries, chart rendering).

mod he_engine;
mod key_management;
mod object_storage;
mod registry;
mod remote_function;
mod report;
mod resource_manager;

pub use he_engine::HeEngine;
pub use key_management::{KeyManagement, KmsError};
pub use object_storage::{ObjectStorage, Payload, Provisioned, StorageError};
pub use registry::{ContainerRegistry, ImageBuilder, RegistryAuth, RegistryError};
pub use remote_function::{
    FunctionCode, FunctionDefinition, FunctionError, FunctionHandler, RawInvocation,
    RemoteFunction,
};
pub use report::{RenderedReport, ReportError, ReportRenderer};
pub use resource_manager::{ResourceError, ResourceManager};
