//! External workload execution.
//!
//! [`subprocess::run_command`] owns spawn, output capture, timeout and
//! cancellation; [`binary::BinaryExecutor`] validates a downloaded artifact
//! and runs it through that path.

pub mod binary;
pub mod subprocess;

use std::path::PathBuf;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Everything needed to launch one workload process.
#[derive(Debug, Clone)]
pub struct ProcessInput {
    pub arguments: Vec<String>,
    /// Working directory for the child process (uses current dir if `None`).
    pub working_directory: Option<PathBuf>,
    /// Maximum wall-clock time before the process is killed.
    pub timeout: Duration,
    /// Externally imposed deadline; cancelling kills the process.
    pub cancel: CancellationToken,
}

impl ProcessInput {
    pub fn new(arguments: Vec<String>, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            arguments,
            working_directory: None,
            timeout,
            cancel,
        }
    }
}

/// Shared test helpers for executor tests.
#[cfg(test)]
pub(crate) mod test_helpers {
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use super::ProcessInput;

    /// `sh -c <script>` input with a 5-second timeout.
    pub fn sh(script: &str) -> ProcessInput {
        ProcessInput::new(
            vec!["-c".to_string(), script.to_string()],
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }
}
