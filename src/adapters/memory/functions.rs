//! In-process function host.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;

use crate::ports::{
    FunctionDefinition, FunctionError, FunctionHandler, RawInvocation, RemoteFunction,
};

/// Body returned by functions without an installed handler.
const PLACEHOLDER_BODY: &[u8] =
    br#"{"statusCode":200,"body":"Placeholder function ran successfully"}"#;

struct Deployed {
    definition: Option<FunctionDefinition>,
    handler: Option<Arc<dyn FunctionHandler>>,
}

/// Runs installed handlers directly when invoked.
#[derive(Default)]
pub struct MemoryFunctionHost {
    functions: RwLock<HashMap<String, Deployed>>,
    /// Handlers attached to functions created later under the same name.
    runtimes: RwLock<HashMap<String, Arc<dyn FunctionHandler>>>,
    failing_creates: AtomicU32,
    creates: AtomicU32,
    deletes: AtomicU32,
}

impl MemoryFunctionHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy `handler` as `name` right away.
    #[must_use]
    pub fn with_function(self, name: &str, handler: Arc<dyn FunctionHandler>) -> Self {
        self.functions.write().unwrap_or_else(PoisonError::into_inner).insert(
            name.to_string(),
            Deployed {
                definition: None,
                handler: Some(handler),
            },
        );
        self
    }

    /// Run `handler` for any function later created as `name`.
    #[must_use]
    pub fn with_runtime(self, name: &str, handler: Arc<dyn FunctionHandler>) -> Self {
        self.runtimes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), handler);
        self
    }

    /// Make the next `count` create calls fail.
    pub fn fail_next_creates(&self, count: u32) {
        self.failing_creates.store(count, Ordering::SeqCst);
    }

    /// Total successful creates.
    pub fn create_count(&self) -> u32 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Total deletes of existing functions.
    pub fn delete_count(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Definition of a created function.
    pub fn definition(&self, name: &str) -> Option<FunctionDefinition> {
        self.functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(|d| d.definition.clone())
    }
}

#[async_trait]
impl RemoteFunction for MemoryFunctionHost {
    async fn invoke(&self, name: &str, payload: Vec<u8>) -> Result<RawInvocation, FunctionError> {
        let handler = {
            let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
            let deployed = functions
                .get(name)
                .ok_or_else(|| FunctionError::NotFound(name.to_string()))?;
            deployed.handler.clone()
        };

        let body = match handler {
            Some(handler) => handler.call(&payload).await,
            None => PLACEHOLDER_BODY.to_vec(),
        };

        Ok(RawInvocation {
            status_code: 200,
            payload: Some(body),
            function_error: None,
        })
    }

    async fn function_exists(&self, name: &str) -> Result<bool, FunctionError> {
        Ok(self
            .functions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name))
    }

    async fn create_function(&self, definition: &FunctionDefinition) -> Result<(), FunctionError> {
        let pending = self.failing_creates.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_creates.store(pending - 1, Ordering::SeqCst);
            return Err(FunctionError::Management(format!(
                "Simulated failure creating {}",
                definition.name
            )));
        }

        let mut functions = self.functions.write().unwrap_or_else(PoisonError::into_inner);
        if functions.contains_key(&definition.name) {
            return Err(FunctionError::Management(format!(
                "Function already exists: {}",
                definition.name
            )));
        }

        let handler = self
            .runtimes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&definition.name)
            .cloned();
        functions.insert(
            definition.name.clone(),
            Deployed {
                definition: Some(definition.clone()),
                handler,
            },
        );
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_function(&self, name: &str) -> Result<bool, FunctionError> {
        let removed = self
            .functions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some();
        if removed {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FunctionCode;

    struct Echo;

    #[async_trait]
    impl FunctionHandler for Echo {
        async fn call(&self, payload: &[u8]) -> Vec<u8> {
            payload.to_vec()
        }
    }

    fn definition(name: &str) -> FunctionDefinition {
        FunctionDefinition {
            name: name.into(),
            role_arn: "arn:aws:iam::000000000000:role/LabRole".into(),
            code: FunctionCode::Image("repo:latest".into()),
            runtime: None,
            handler: None,
            timeout_secs: 60,
            memory_mb: 1024,
        }
    }

    #[tokio::test]
    async fn test_invoke_runs_handler() {
        let host = MemoryFunctionHost::new().with_function("f", Arc::new(Echo));
        let raw = host.invoke("f", b"{}".to_vec()).await.expect("invoke");

        assert_eq!(raw.status_code, 200);
        assert_eq!(raw.payload.as_deref(), Some(&b"{}"[..]));
    }

    #[tokio::test]
    async fn test_invoke_missing_function() {
        let host = MemoryFunctionHost::new();
        assert!(matches!(
            host.invoke("nope", Vec::new()).await,
            Err(FunctionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_created_function_picks_up_runtime() {
        let host = MemoryFunctionHost::new().with_runtime("f", Arc::new(Echo));
        host.create_function(&definition("f")).await.expect("create");

        let raw = host.invoke("f", b"ping".to_vec()).await.expect("invoke");
        assert_eq!(raw.payload.as_deref(), Some(&b"ping"[..]));
        assert_eq!(host.definition("f").map(|d| d.memory_mb), Some(1024));
    }

    #[tokio::test]
    async fn test_placeholder_and_lifecycle() {
        let host = MemoryFunctionHost::new();
        host.create_function(&definition("p")).await.expect("create");
        assert!(host.create_function(&definition("p")).await.is_err());

        let raw = host.invoke("p", Vec::new()).await.expect("invoke");
        assert_eq!(raw.payload.as_deref(), Some(PLACEHOLDER_BODY));

        assert!(host.delete_function("p").await.expect("delete"));
        assert!(!host.delete_function("p").await.expect("delete"));
        assert!(!host.function_exists("p").await.expect("exists"));
    }

    #[tokio::test]
    async fn test_injected_create_failures() {
        let host = MemoryFunctionHost::new();
        host.fail_next_creates(1);
        assert!(host.create_function(&definition("f")).await.is_err());
        assert!(host.create_function(&definition("f")).await.is_ok());
        assert_eq!(host.create_count(), 1);
    }
}
