//! Host scripting bridge

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::HostConfig;

/// Errors from evaluating a script in the host
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Host scripting bridge is not available")]
    Unavailable,

    #[error("Failed to start host evaluator: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Host evaluation timed out after {0}ms")]
    Timeout(u64),

    #[error("Host evaluation failed: {0}")]
    Failed(String),
}

/// Asynchronous evaluation of script source in the host application
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Evaluate `script` and return its raw string result
    async fn eval(&self, script: &str) -> Result<String, BridgeError>;
}

/// Bridge for when no host runtime is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableBridge;

#[async_trait]
impl HostBridge for UnavailableBridge {
    async fn eval(&self, _script: &str) -> Result<String, BridgeError> {
        debug!("UnavailableBridge::eval: called");
        Err(BridgeError::Unavailable)
    }
}

/// Evaluates scripts by piping them to an external evaluator process
#[derive(Debug, Clone)]
pub struct ProcessBridge {
    program: String,
    args: Vec<String>,
    timeout_ms: u64,
}

impl ProcessBridge {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout_ms: u64) -> Self {
        Self {
            program: program.into(),
            args,
            timeout_ms,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl HostBridge for ProcessBridge {
    async fn eval(&self, script: &str) -> Result<String, BridgeError> {
        debug!(program = %self.program, script_len = script.len(), "ProcessBridge::eval: called");
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = match tokio::time::timeout(Duration::from_millis(self.timeout_ms), child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                debug!("ProcessBridge::eval: evaluator timed out");
                return Err(BridgeError::Timeout(self.timeout_ms));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(status = ?output.status, %stderr, "ProcessBridge::eval: evaluator failed");
            let message = if stderr.is_empty() {
                format!("evaluator exited with {}", output.status)
            } else {
                stderr
            };
            return Err(BridgeError::Failed(message));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Build the bridge described by config
pub fn create_bridge(config: &HostConfig) -> std::sync::Arc<dyn HostBridge> {
    match config.program.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(program) => {
            debug!(%program, "create_bridge: process bridge");
            std::sync::Arc::new(ProcessBridge::new(program, config.args.clone(), config.timeout_ms))
        }
        None => {
            debug!("create_bridge: no evaluator configured");
            std::sync::Arc::new(UnavailableBridge)
        }
    }
}
