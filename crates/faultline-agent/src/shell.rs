//! Host command execution

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use faultline_core::{FaultError, HostCommand};

/// Runs host commands and returns their trimmed stdout
#[async_trait]
pub trait HostShell: Send + Sync {
    async fn run(&self, command: &HostCommand) -> Result<String, FaultError>;
}

/// `HostShell` backed by real processes.
///
/// A command fails when it cannot be spawned, exits non-zero, or writes
/// anything to stderr.
#[derive(Debug, Clone, Default)]
pub struct ProcessShell;

impl ProcessShell {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostShell for ProcessShell {
    async fn run(&self, command: &HostCommand) -> Result<String, FaultError> {
        info!(cmd = %command, "executing host command");

        let output = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| FaultError::Apply {
                command: command.to_string(),
                reason: format!("failed to spawn: {}", e),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            return Err(FaultError::Apply {
                command: command.to_string(),
                reason: stderr.trim().to_string(),
            });
        }
        if !output.status.success() {
            return Err(FaultError::Apply {
                command: command.to_string(),
                reason: format!("exited with {}", output.status),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(cmd = %command, bytes = stdout.len(), "host command succeeded");
        Ok(stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_is_trimmed() {
        let out = ProcessShell::new()
            .run(&HostCommand::new("echo").arg("  hello  "))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn test_stderr_output_is_failure() {
        let err = ProcessShell::new()
            .run(&HostCommand::new("sh").args(["-c", "echo oops >&2"]))
            .await
            .unwrap_err();

        match err {
            FaultError::Apply { reason, .. } => assert_eq!(reason, "oops"),
            other => panic!("expected apply error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let err = ProcessShell::new()
            .run(&HostCommand::new("false"))
            .await
            .unwrap_err();
        assert!(matches!(err, FaultError::Apply { .. }));
    }

    #[tokio::test]
    async fn test_missing_program_is_failure() {
        let err = ProcessShell::new()
            .run(&HostCommand::new("/nonexistent/faultline-test-binary"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
