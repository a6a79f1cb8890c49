//! Remote function port: synchronous invocation and lifecycle of the
//! decryption function.

use async_trait::async_trait;

/// Errors from the function host.
#[derive(Debug, thiserror::Error)]
pub enum FunctionError {
    #[error("Function not found: {0}")]
    NotFound(String),

    #[error("Invocation of {name} failed: {message}")]
    Invoke { name: String, message: String },

    #[error("Function management failed: {0}")]
    Management(String),
}

/// Raw result of a request/response invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInvocation {
    /// Transport-level status code reported by the host.
    pub status_code: u16,
    /// Response body, if any.
    pub payload: Option<Vec<u8>>,
    /// Error classification reported by the host for unhandled errors.
    pub function_error: Option<String>,
}

/// How the function code is packaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCode {
    /// Zip archive uploaded inline.
    Zip(Vec<u8>),
    /// Container image URI.
    Image(String),
}

/// Everything needed to create a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    pub name: String,
    pub role_arn: String,
    pub code: FunctionCode,
    /// Runtime identifier, only used for zip packages.
    pub runtime: Option<String>,
    /// Entry point, only used for zip packages.
    pub handler: Option<String>,
    pub timeout_secs: i32,
    pub memory_mb: i32,
}

/// Serverless function host.
#[async_trait]
pub trait RemoteFunction: Send + Sync {
    /// Invoke `name` synchronously with a JSON body.
    async fn invoke(&self, name: &str, payload: Vec<u8>) -> Result<RawInvocation, FunctionError>;

    async fn function_exists(&self, name: &str) -> Result<bool, FunctionError>;

    async fn create_function(&self, definition: &FunctionDefinition) -> Result<(), FunctionError>;

    /// Delete a function. Returns `false` if there was nothing to delete.
    async fn delete_function(&self, name: &str) -> Result<bool, FunctionError>;
}

/// Code that runs inside a function host: raw JSON bytes in and out.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, payload: &[u8]) -> Vec<u8>;
}
