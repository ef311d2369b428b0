//! Job outcomes and the orchestrator callback seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::metric::Metric;
use crate::types::{JobId, Timestamp};

/// CodePipeline caps failure messages at 5000 characters.
pub const MAX_DIAGNOSTIC_CHARS: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Success,
    Failure,
}

/// Final result of one invocation, delivered to the orchestrator once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub verdict: Verdict,
    /// Why the job failed; `None` on success.
    pub diagnostic: Option<String>,
    /// The metric that was published, if any.
    pub metric: Option<Metric>,
    /// Text produced by an inline SQL job.
    pub output: Option<String>,
    pub completed_at: Timestamp,
}

impl JobOutcome {
    pub fn success(job_id: JobId, metric: Option<Metric>, output: Option<String>) -> Self {
        Self {
            job_id,
            verdict: Verdict::Success,
            diagnostic: None,
            metric,
            output,
            completed_at: chrono::Utc::now(),
        }
    }

    pub fn failure(job_id: JobId, diagnostic: impl Into<String>) -> Self {
        Self {
            job_id,
            verdict: Verdict::Failure,
            diagnostic: Some(truncate_diagnostic(&diagnostic.into())),
            metric: None,
            output: None,
            completed_at: chrono::Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.verdict == Verdict::Success
    }
}

/// Cut a diagnostic down to [`MAX_DIAGNOSTIC_CHARS`] on a char boundary.
pub fn truncate_diagnostic(message: &str) -> String {
    if message.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return message.to_string();
    }
    let mut out: String = message.chars().take(MAX_DIAGNOSTIC_CHARS - 3).collect();
    out.push_str("...");
    out
}

/// The completion callback itself failed. Nothing local can recover this.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("orchestrator rejected completion for job {job_id}: {message}")]
    Rejected { job_id: String, message: String },

    #[error("orchestrator unreachable: {0}")]
    Transport(String),
}

/// Orchestrator completion callbacks.
#[async_trait]
pub trait JobReporter: Send + Sync {
    async fn report_success(&self, job_id: &JobId) -> Result<(), ReportError>;

    async fn report_failure(&self, job_id: &JobId, diagnostic: &str) -> Result<(), ReportError>;
}
