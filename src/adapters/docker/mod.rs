//! Docker CLI image builder.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::ports::{ImageBuilder, RegistryAuth, RegistryError};

/// Runs the `docker` binary found on `PATH` (or a configured path).
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".into(),
        }
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn build_args(context: &Path, tag: &str, platform: &str) -> Vec<String> {
        vec![
            "build".into(),
            "--platform".into(),
            platform.into(),
            "--provenance=false".into(),
            "-t".into(),
            tag.into(),
            context.display().to_string(),
        ]
    }

    async fn run(&self, args: &[String], stdin: Option<&[u8]>) -> Result<(), RegistryError> {
        let command_line = format!("{} {}", self.program, args.first().map_or("", String::as_str));
        tracing::info!("Running {command_line}...");

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input).await?;
            // Close stdin so the child sees EOF
            drop(pipe);
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(RegistryError::Command {
                command: command_line,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn login(&self, auth: &RegistryAuth) -> Result<(), RegistryError> {
        let args = vec![
            "login".to_string(),
            "--username".into(),
            auth.username.clone(),
            "--password-stdin".into(),
            auth.endpoint.clone(),
        ];
        self.run(&args, Some(auth.password.as_bytes())).await
    }

    async fn build(&self, context: &Path, tag: &str, platform: &str) -> Result<(), RegistryError> {
        self.run(&Self::build_args(context, tag, platform), None).await
    }

    async fn push(&self, tag: &str) -> Result<(), RegistryError> {
        self.run(&["push".to_string(), tag.to_string()], None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = DockerCli::build_args(Path::new("."), "repo:latest", "linux/amd64");
        assert_eq!(
            args,
            vec![
                "build",
                "--platform",
                "linux/amd64",
                "--provenance=false",
                "-t",
                "repo:latest",
                "."
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_command_reports_status() {
        let cli = DockerCli::new("false");
        let result = cli.push("repo:latest").await;
        assert!(matches!(result, Err(RegistryError::Command { status: 1, .. })));
    }

    #[tokio::test]
    async fn test_missing_program_is_io_error() {
        let cli = DockerCli::new("/nonexistent/docker-binary");
        assert!(matches!(cli.push("x").await, Err(RegistryError::Io(_))));
    }
}
