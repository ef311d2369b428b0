//! Bounded execution of a remote SQL script.
//!
//! The script is read line by line and each line is sent to the target as
//! one statement, up to a fixed cap. Whether a failing statement aborts the
//! batch is governed by [`StatementPolicy`]; the default carries on.

use std::pin::Pin;
use std::time::Instant;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use actionrunner_core::execution::ExecutionError;
use actionrunner_core::workload::StatementPolicy;

use crate::session::SqlSession;

/// Line stream of a script resource.
pub type ScriptLines = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// Opens a line-oriented reader over a script resource.
#[async_trait]
pub trait ScriptSource: Send + Sync {
    async fn open(&self, location: &str) -> Result<ScriptLines, ExecutionError>;
}

/// Tally of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Lines consumed from the script (blank ones included).
    pub lines_read: usize,
    pub executed: usize,
    pub failed: usize,
    pub skipped_blank: usize,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!(
            "lines_read={} executed={} failed={} skipped_blank={}",
            self.lines_read, self.executed, self.failed, self.skipped_blank
        )
    }
}

/// Execute up to `max_statements` lines from `lines` against `session`.
///
/// Blank lines are not sent but count toward the cap. With the default
/// policy a failing statement is logged and the batch moves on; with
/// `stop_on_error` the first failure ends the batch with
/// [`ExecutionError::Sql`]. A read error on the script is always fatal.
pub async fn run_statement_batch(
    session: &dyn SqlSession,
    mut lines: ScriptLines,
    max_statements: usize,
    policy: StatementPolicy,
    cancel: &CancellationToken,
) -> Result<BatchReport, ExecutionError> {
    let start = Instant::now();
    let cancelled = |start: Instant| ExecutionError::Cancelled {
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    let mut report = BatchReport::default();

    while report.lines_read < max_statements {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(start)),
            next = lines.next() => next,
        };
        let Some(line) = next else { break };
        let line = line.map_err(|e| ExecutionError::Transport(e.to_string()))?;
        report.lines_read += 1;

        let statement = line.trim();
        if statement.is_empty() {
            report.skipped_blank += 1;
            continue;
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(start)),
            result = session.execute(statement) => result,
        };

        match result {
            Ok(rows) => {
                report.executed += 1;
                tracing::debug!(line = report.lines_read, rows, statement, "Statement executed");
            }
            Err(e) if policy.stop_on_error => {
                report.failed += 1;
                return Err(ExecutionError::Sql(format!(
                    "statement on line {} failed: {e}",
                    report.lines_read
                )));
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    line = report.lines_read,
                    statement,
                    error = %e,
                    "Statement failed, continuing"
                );
            }
        }
    }

    tracing::info!(
        lines_read = report.lines_read,
        executed = report.executed,
        failed = report.failed,
        "Statement batch finished"
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
