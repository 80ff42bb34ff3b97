//! Background-removal invocation: run the external transform against a
//! workspace artifact and verify it actually produced something.
//!
//! The matting capability itself is a black box behind the [`Transformer`]
//! trait — the pipeline only knows "given an input path and an output path,
//! a valid image must exist at the output path on success". The default
//! implementation spawns a subprocess, but the trait leaves room for a
//! sidecar service or an in-process library call without touching the
//! orchestrator, and lets tests substitute trivial shell commands.
//!
//! ## The exit status is not trusted alone
//!
//! [`invoke`] checks the output artifact exists and is non-empty on the
//! filesystem even when the transformer reports success. A model wrapper
//! that swallows its own failure and exits 0 would otherwise push an empty
//! object into durable storage.

use crate::config::ServiceConfig;
use crate::error::RemovalError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// An out-of-process (or out-of-crate) content transform.
///
/// Contract: on `Ok(())`, a usable artifact exists at `output`.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, input: &Path, output: &Path) -> Result<(), RemovalError>;
}

/// Run the transformer and enforce the output post-condition.
///
/// This is the entry point the orchestrator uses; calling the trait method
/// directly would skip the existence check.
pub async fn invoke(
    transformer: &dyn Transformer,
    input: &Path,
    output: &Path,
) -> Result<(), RemovalError> {
    transformer.transform(input, output).await?;

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(RemovalError::TransformOutputMissing {
            path: output.to_path_buf(),
        }),
    }
}

/// Subprocess-based [`Transformer`]: spawns `program args… input output`.
pub struct CommandTransformer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandTransformer {
    pub fn new<I, S>(program: impl Into<String>, args: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            timeout,
        }
    }

    /// Build the transformer the service configuration describes.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            &config.transform_program,
            config.transform_args.clone(),
            config.transform_timeout,
        )
    }
}

#[async_trait]
impl Transformer for CommandTransformer {
    async fn transform(&self, input: &Path, output: &Path) -> Result<(), RemovalError> {
        debug!(
            "spawning transform: {} {:?} {} {}",
            self.program,
            self.args,
            input.display(),
            output.display()
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // If the timeout fires, dropping the wait future must take the
            // process down with it.
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| RemovalError::TransformFailed {
            status: "spawn".to_string(),
            detail: format!("could not start '{}': {e}", self.program),
        })?;

        let collected = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                warn!(
                    "transform exceeded {}s budget, killing it",
                    self.timeout.as_secs()
                );
                return Err(RemovalError::TransformTimeout {
                    secs: self.timeout.as_secs(),
                });
            }
            Ok(Err(e)) => {
                return Err(RemovalError::TransformFailed {
                    status: "wait".to_string(),
                    detail: e.to_string(),
                })
            }
            Ok(Ok(out)) => out,
        };

        let stdout = String::from_utf8_lossy(&collected.stdout);
        let stderr = String::from_utf8_lossy(&collected.stderr);

        if !collected.status.success() {
            return Err(RemovalError::TransformFailed {
                status: collected.status.to_string(),
                detail: format!("STDOUT:\n{stdout}\nSTDERR:\n{stderr}"),
            });
        }

        // On success the diagnostic channels are informational only.
        if !stdout.trim().is_empty() {
            info!("transform stdout: {}", stdout.trim());
        }
        if !stderr.trim().is_empty() {
            info!("transform stderr: {}", stderr.trim());
        }

        Ok(())
    }
}
