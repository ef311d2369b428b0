//! Exactly-once completion reporting.
//!
//! A [`CompletionGuard`] is armed as soon as an invocation's job id is
//! known. Consuming it with [`CompletionGuard::complete`] sends the verdict;
//! dropping it while still armed (the handler future was cancelled or a
//! panic escaped) spawns a failure report on the current runtime instead.
//! Either way the orchestrator hears about the job once.

use std::sync::Arc;

use actionrunner_core::outcome::{JobOutcome, JobReporter, ReportError, Verdict};
use actionrunner_core::types::JobId;

/// Diagnostic sent when a job is abandoned before it finished.
pub const ABANDONED_DIAGNOSTIC: &str = "invocation abandoned before completion";

pub struct CompletionGuard {
    reporter: Arc<dyn JobReporter>,
    job_id: JobId,
    armed: bool,
}

impl CompletionGuard {
    pub fn new(reporter: Arc<dyn JobReporter>, job_id: JobId) -> Self {
        Self {
            reporter,
            job_id,
            armed: true,
        }
    }

    /// Deliver `outcome`. The guard is disarmed before the call goes out,
    /// so a failed or interrupted callback is never repeated.
    pub async fn complete(mut self, outcome: &JobOutcome) -> Result<(), ReportError> {
        self.armed = false;
        match outcome.verdict {
            Verdict::Success => self.reporter.report_success(&self.job_id).await,
            Verdict::Failure => {
                let diagnostic = outcome.diagnostic.as_deref().unwrap_or("job failed");
                self.reporter.report_failure(&self.job_id, diagnostic).await
            }
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let job_id = self.job_id.clone();
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::error!(job_id = %job_id, "Job abandoned outside a runtime, failure not reported");
            return;
        };

        tracing::warn!(job_id = %job_id, "Job abandoned, reporting failure");
        let reporter = Arc::clone(&self.reporter);
        handle.spawn(async move {
            if let Err(e) = reporter.report_failure(&job_id, ABANDONED_DIAGNOSTIC).await {
                tracing::error!(job_id = %job_id, error = %e, "Abandoned-job report failed");
            }
        });
    }
}
