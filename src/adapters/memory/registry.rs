//! In-memory registry and an image builder that records what it was asked to do.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::ports::{ContainerRegistry, ImageBuilder, RegistryAuth, RegistryError};

const REGISTRY_HOST: &str = "000000000000.dkr.ecr.local.amazonaws.com";

#[derive(Default)]
pub struct MemoryRegistry {
    repositories: RwLock<HashMap<String, String>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repository_count(&self) -> usize {
        self.repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ContainerRegistry for MemoryRegistry {
    async fn repository_uri(&self, name: &str) -> Result<Option<String>, RegistryError> {
        Ok(self
            .repositories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned())
    }

    async fn create_repository(&self, name: &str) -> Result<String, RegistryError> {
        let uri = format!("{REGISTRY_HOST}/{name}");
        let mut repos = self.repositories.write().unwrap_or_else(PoisonError::into_inner);
        if repos.contains_key(name) {
            return Err(RegistryError::Registry(format!(
                "Repository {name} already exists"
            )));
        }
        repos.insert(name.to_string(), uri.clone());
        Ok(uri)
    }

    async fn authorization(&self) -> Result<RegistryAuth, RegistryError> {
        Ok(RegistryAuth {
            username: "AWS".into(),
            password: "memory-token".into(),
            endpoint: format!("https://{REGISTRY_HOST}"),
        })
    }
}

/// Image builder that only records calls.
#[derive(Default)]
pub struct RecordingImageBuilder {
    calls: RwLock<Vec<String>>,
}

impl RecordingImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls in order, e.g. `["login", "build repo:latest", "push repo:latest"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, call: String) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl ImageBuilder for RecordingImageBuilder {
    async fn login(&self, _auth: &RegistryAuth) -> Result<(), RegistryError> {
        self.record("login".into());
        Ok(())
    }

    async fn build(&self, context: &Path, tag: &str, _platform: &str) -> Result<(), RegistryError> {
        if !context.join("Dockerfile").exists() {
            return Err(RegistryError::Registry(format!(
                "No Dockerfile in {}",
                context.display()
            )));
        }
        self.record(format!("build {tag}"));
        Ok(())
    }

    async fn push(&self, tag: &str) -> Result<(), RegistryError> {
        self.record(format!("push {tag}"));
        Ok(())
    }
}
