//! Binary executable executor.
//!
//! Runs a downloaded workload binary directly (not through a shell).
//! Validates that the file exists and has execute permissions before
//! spawning, and turns a non-zero exit into an [`ExecutionError`].

use std::path::Path;

use super::subprocess;
use super::ProcessInput;
use crate::execution::{ExecutionError, ExecutionResult};

/// Executor for pre-compiled workload binaries.
pub struct BinaryExecutor;

impl BinaryExecutor {
    pub async fn execute(
        &self,
        binary_path: &Path,
        input: ProcessInput,
    ) -> Result<ExecutionResult, ExecutionError> {
        let path_text = binary_path.display().to_string();

        let metadata = tokio::fs::metadata(binary_path)
            .await
            .map_err(|_| ExecutionError::NotFound(path_text.clone()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                return Err(ExecutionError::PermissionDenied(format!(
                    "{path_text} is not executable (mode {mode:#o})"
                )));
            }
        }
        #[cfg(not(unix))]
        let _ = metadata;

        tracing::info!(binary = %path_text, args = ?input.arguments, "Running workload binary");

        let mut cmd = tokio::process::Command::new(binary_path);
        let result = subprocess::run_command(&mut cmd, input).await?;

        if result.exit_code != 0 {
            return Err(ExecutionError::NonZeroExit {
                exit_code: result.exit_code,
                stderr: result.stderr_tail,
            });
        }

        tracing::info!(
            binary = %path_text,
            duration_ms = result.duration_ms,
            stdout_bytes = result.stdout.len(),
            "Workload binary finished"
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
