//! Orchestrator callbacks: report a job's verdict to CodePipeline.

use async_trait::async_trait;
use aws_sdk_codepipeline::types::{FailureDetails, FailureType};

use actionrunner_core::outcome::{truncate_diagnostic, JobReporter, ReportError};
use actionrunner_core::types::JobId;

use crate::describe;

pub struct CodePipelineReporter {
    client: aws_sdk_codepipeline::Client,
}

impl CodePipelineReporter {
    pub fn new(client: aws_sdk_codepipeline::Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_codepipeline::Client::new(config))
    }
}

#[async_trait]
impl JobReporter for CodePipelineReporter {
    async fn report_success(&self, job_id: &JobId) -> Result<(), ReportError> {
        self.client
            .put_job_success_result()
            .job_id(job_id.as_str())
            .send()
            .await
            .map_err(|e| report_error(job_id, e.as_service_error().is_some(), describe(&e)))?;

        tracing::info!(job_id = %job_id, "Reported job success");
        Ok(())
    }

    async fn report_failure(&self, job_id: &JobId, diagnostic: &str) -> Result<(), ReportError> {
        let details = failure_details(diagnostic).map_err(|message| ReportError::Rejected {
            job_id: job_id.to_string(),
            message,
        })?;

        self.client
            .put_job_failure_result()
            .job_id(job_id.as_str())
            .failure_details(details)
            .send()
            .await
            .map_err(|e| report_error(job_id, e.as_service_error().is_some(), describe(&e)))?;

        tracing::info!(job_id = %job_id, "Reported job failure");
        Ok(())
    }
}

fn report_error(job_id: &JobId, rejected: bool, message: String) -> ReportError {
    if rejected {
        ReportError::Rejected {
            job_id: job_id.to_string(),
            message,
        }
    } else {
        ReportError::Transport(message)
    }
}

/// Failure details within the orchestrator's message limit.
pub(crate) fn failure_details(diagnostic: &str) -> Result<FailureDetails, String> {
    FailureDetails::builder()
        .r#type(FailureType::JobFailed)
        .message(truncate_diagnostic(diagnostic))
        .build()
        .map_err(|e| e.to_string())
}
