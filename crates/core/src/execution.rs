//! Results and failures of running a workload against the target.

use serde::{Deserialize, Serialize};

/// Captured output of one workload execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Complete stdout (or rendered record sets for inline SQL).
    pub stdout: String,
    /// Tail of stderr, kept for diagnostics only; never scanned for metrics.
    pub stderr_tail: String,
    /// Process exit code (`0` for in-process SQL workloads).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Errors that can occur while executing a workload.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Workload not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Workload timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Workload cancelled after {elapsed_ms}ms")]
    Cancelled { elapsed_ms: u64 },

    #[error("Workload failed with exit code {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Script source unavailable: {0}")]
    Transport(String),

    #[error("SQL execution failed: {0}")]
    Sql(String),
}
