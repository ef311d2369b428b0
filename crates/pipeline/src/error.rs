use actionrunner_core::artifact::ArtifactFetchError;
use actionrunner_core::execution::ExecutionError;
use actionrunner_core::invocation::DecodeError;
use actionrunner_core::metric::PublishError;
use actionrunner_core::outcome::ReportError;
use actionrunner_db::SqlError;

/// Steps of one invocation, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Decoded,
    ArtifactAcquired,
    Executed,
    Extracted,
    Published,
    Reported,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Decoded => "decoded",
            Self::ArtifactAcquired => "artifact_acquired",
            Self::Executed => "executed",
            Self::Extracted => "extracted",
            Self::Published => "published",
            Self::Reported => "reported",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failed; the job is reported as failed with this as diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("invalid invocation: {0}")]
    Decode(#[from] DecodeError),

    #[error("artifact acquisition failed: {0}")]
    Artifact(#[from] ArtifactFetchError),

    #[error("target session unavailable: {0}")]
    Session(#[from] SqlError),

    #[error("{0}")]
    Execution(#[from] ExecutionError),

    #[error("metric publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("internal error: {0}")]
    Panicked(String),
}

impl StageError {
    /// The last stage that completed before the failure.
    pub fn last_completed(&self) -> Stage {
        match self {
            Self::Decode(_) => Stage::Received,
            Self::Artifact(_) | Self::Session(_) | Self::Execution(_) => Stage::Decoded,
            Self::Publish(_) => Stage::Extracted,
            Self::Panicked(_) => Stage::Received,
        }
    }
}

/// Failures surfaced to the host instead of being reported as a verdict.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// No usable job id: there is nobody to report to.
    #[error(transparent)]
    Decode(DecodeError),

    /// The completion callback itself failed.
    #[error("completion report for job {job_id} failed: {source}")]
    Report {
        job_id: String,
        #[source]
        source: ReportError,
    },
}
