//! Shared subprocess management.
//!
//! [`run_command`] spawns a prepared [`tokio::process::Command`], captures
//! stdout in full and the tail of stderr, and waits for exit while racing
//! the configured timeout and the caller's cancellation token. The child is
//! killed if either fires.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::ProcessInput;
use crate::execution::{ExecutionError, ExecutionResult};

/// How much of stderr is kept for diagnostics.
const STDERR_TAIL_BYTES: usize = 4 * 1024;

enum Waited {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Spawn `cmd` with the input's arguments and wait for it.
///
/// The caller sets the program; arguments, environment and working
/// directory come from [`ProcessInput`]. A non-zero exit is *not* an error
/// here: callers decide what an exit code means.
pub async fn run_command(
    cmd: &mut Command,
    input: ProcessInput,
) -> Result<ExecutionResult, ExecutionError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    cmd.args(&input.arguments)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &input.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| match e.kind() {
        ErrorKind::NotFound => ExecutionError::NotFound(program.clone()),
        ErrorKind::PermissionDenied => ExecutionError::PermissionDenied(program.clone()),
        _ => ExecutionError::Io(e),
    })?;

    tracing::debug!(program = %program, pid = child.id(), "Workload process spawned");

    // Read both streams in their own tasks so a chatty child never blocks on
    // a full pipe while we wait for it.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_all(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_tail(stderr_handle, STDERR_TAIL_BYTES).await });

    let waited = tokio::select! {
        status = child.wait() => Waited::Exited(status),
        _ = tokio::time::sleep(input.timeout) => Waited::TimedOut,
        _ = input.cancel.cancelled() => Waited::Cancelled,
    };

    let elapsed_ms = start.elapsed().as_millis() as u64;

    match waited {
        Waited::Exited(Ok(status)) => {
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            Ok(ExecutionResult {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr_tail: tail(&stderr_bytes),
                exit_code: status.code().unwrap_or(-1),
                duration_ms: elapsed_ms,
            })
        }
        Waited::Exited(Err(e)) => Err(ExecutionError::Io(e)),
        Waited::TimedOut => {
            kill(&mut child, &program).await;
            Err(ExecutionError::Timeout { elapsed_ms })
        }
        Waited::Cancelled => {
            kill(&mut child, &program).await;
            Err(ExecutionError::Cancelled { elapsed_ms })
        }
    }
}

async fn kill(child: &mut tokio::process::Child, program: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!(program, error = %e, "Failed to kill workload process");
    }
}

/// Read an entire output stream into a byte buffer.
async fn read_all<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        if let Err(e) = h.read_to_end(&mut buf).await {
            tracing::warn!(error = %e, "Failed to read workload stdout");
        }
    }
    buf
}

/// Drain a stream to EOF, keeping roughly the last `keep` bytes.
///
/// The pipe stays open until the child closes it, so a chatty process never
/// sees a broken pipe.
async fn read_tail<R: AsyncRead + Unpin>(handle: Option<R>, keep: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(mut h) = handle else {
        return buf;
    };
    let mut chunk = [0u8; 8 * 1024];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > keep * 2 {
                    buf.drain(..buf.len() - keep);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read workload stderr");
                break;
            }
        }
    }
    buf
}

/// Last [`STDERR_TAIL_BYTES`] of a stream, lossily decoded.
fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
