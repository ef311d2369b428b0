//! The per-invocation stage pipeline.
//!
//! ```text
//! Received -> Decoded -> [ArtifactAcquired] -> Executed -> [Extracted -> Published] -> Reported
//! ```
//!
//! Any stage failure short-circuits to a failure report. Stages never retry.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use actionrunner_core::artifact::{self, ArtifactStore};
use actionrunner_core::execution::{ExecutionError, ExecutionResult};
use actionrunner_core::extract::extract_metric;
use actionrunner_core::invocation::{decode_envelope, decode_parameters, InvocationEnvelope};
use actionrunner_core::job::JobDescriptor;
use actionrunner_core::metric::{Metric, MetricSink};
use actionrunner_core::outcome::{JobOutcome, JobReporter};
use actionrunner_core::scratch::ScratchSpace;
use actionrunner_core::scripting::binary::BinaryExecutor;
use actionrunner_core::scripting::ProcessInput;
use actionrunner_core::workload::WorkloadSpec;
use actionrunner_db::inline::{execute_inline, render_record_sets};
use actionrunner_db::script::{run_statement_batch, ScriptSource};
use actionrunner_db::{SessionCache, SqlSession};

use crate::completion::CompletionGuard;
use crate::error::{RunnerError, Stage, StageError};
use crate::profile::{JobProfile, PublishPolicy};

/// External systems a runner talks to. Cheap to clone.
#[derive(Clone)]
pub struct Collaborators {
    pub artifacts: Arc<dyn ArtifactStore>,
    pub sessions: Arc<SessionCache>,
    pub scripts: Arc<dyn ScriptSource>,
    pub metrics: Arc<dyn MetricSink>,
    pub reporter: Arc<dyn JobReporter>,
    /// Root under which per-job scratch directories are created.
    pub scratch_root: PathBuf,
}

/// What the stages produced for a successful job.
struct StageOutput {
    metric: Option<Metric>,
    output: Option<String>,
}

/// Runs invocations of one job type.
pub struct ActionRunner {
    profile: JobProfile,
    deps: Collaborators,
}

impl ActionRunner {
    pub fn new(profile: JobProfile, deps: Collaborators) -> Self {
        Self { profile, deps }
    }

    /// Handle one raw invocation payload.
    ///
    /// Returns the outcome that was reported. Errors are reserved for the
    /// two cases where no verdict can be delivered: the payload carries no
    /// job id, or the completion callback itself failed.
    pub async fn handle(
        &self,
        raw: &[u8],
        cancel: CancellationToken,
    ) -> Result<JobOutcome, RunnerError> {
        // 1. Envelope. Without a job id there is nobody to report to.
        let envelope = decode_envelope(raw).map_err(|e| {
            tracing::warn!(job_type = %self.profile.kind, error = %e, "Rejected invocation without job id");
            RunnerError::Decode(e)
        })?;

        let job_id = envelope.job_id.clone();
        let span = tracing::info_span!("job", job_id = %job_id, job_type = %self.profile.kind);

        async move {
            let guard = CompletionGuard::new(Arc::clone(&self.deps.reporter), job_id.clone());
            let scratch = ScratchSpace::for_job(&self.deps.scratch_root, &job_id);
            tracing::info!(stage = %Stage::Received, "Invocation received");

            // 2..5. Stages, with panics turned into failures.
            let result = AssertUnwindSafe(self.run_stages(envelope, &scratch, &cancel))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(StageError::Panicked(panic_message(&*panic))));

            if let Err(e) = scratch.remove().await {
                tracing::warn!(path = %scratch.dir().display(), error = %e, "Scratch cleanup failed");
            }

            let outcome = match result {
                Ok(done) => JobOutcome::success(job_id.clone(), done.metric, done.output),
                Err(e) => {
                    tracing::error!(after = %e.last_completed(), error = %e, "Job failed");
                    JobOutcome::failure(job_id.clone(), e.to_string())
                }
            };

            // 6. Report exactly once.
            guard.complete(&outcome).await.map_err(|source| {
                tracing::error!(error = %source, "Completion report failed");
                RunnerError::Report {
                    job_id: job_id.to_string(),
                    source,
                }
            })?;

            tracing::info!(stage = %Stage::Reported, verdict = ?outcome.verdict, "Job reported");
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        envelope: InvocationEnvelope,
        scratch: &ScratchSpace,
        cancel: &CancellationToken,
    ) -> Result<StageOutput, StageError> {
        let job = decode_parameters(
            envelope.job_id,
            self.profile.kind,
            envelope.user_parameters.as_deref(),
            self.profile.target_port,
        )?;
        tracing::info!(
            stage = %Stage::Decoded,
            target = %job.target,
            tidb_instance = ?job.cluster.tidb_instance_id,
            tikv_instances = ?job.cluster.tikv_instance_ids,
            "Invocation decoded"
        );

        let workload = self.profile.workload(&job);
        let result = self.execute(&job, &workload, scratch, cancel).await?;
        tracing::info!(
            stage = %Stage::Executed,
            workload = workload.kind_name(),
            duration_ms = result.duration_ms,
            "Workload executed"
        );

        let output = match workload {
            WorkloadSpec::SqlScript { .. } | WorkloadSpec::InlineSql { .. } => Some(result.stdout.clone()),
            WorkloadSpec::ExternalBinary { .. } | WorkloadSpec::None => None,
        };

        let Some(identity) = self.profile.metric_identity(&job) else {
            return Ok(StageOutput {
                metric: None,
                output,
            });
        };

        let metric = extract_metric(&result.stdout, &self.profile.summary, &identity);
        tracing::info!(stage = %Stage::Extracted, name = %metric.name, value = metric.value, "Metric extracted");

        let metric = self.publish(metric, cancel).await?;
        Ok(StageOutput { metric, output })
    }

    async fn execute(
        &self,
        job: &JobDescriptor,
        workload: &WorkloadSpec,
        scratch: &ScratchSpace,
        cancel: &CancellationToken,
    ) -> Result<ExecutionResult, StageError> {
        let timeout = self.profile.workload_timeout;

        match workload {
            WorkloadSpec::None => Ok(ExecutionResult::default()),

            WorkloadSpec::ExternalBinary {
                artifact_key,
                arguments,
                prepare_arguments,
            } => {
                let path = scratch.file(artifact_key);
                let bytes = bounded(
                    cancel,
                    timeout,
                    artifact::acquire(&*self.deps.artifacts, artifact_key, &path, true),
                )
                .await?;
                tracing::info!(stage = %Stage::ArtifactAcquired, key = %artifact_key, bytes, "Artifact acquired");

                let input = |args: &Vec<String>| {
                    let mut input = ProcessInput::new(args.clone(), timeout, cancel.clone());
                    input.working_directory = Some(scratch.dir().to_path_buf());
                    input
                };

                if let Some(prepare) = prepare_arguments {
                    BinaryExecutor.execute(&path, input(prepare)).await?;
                    tracing::info!("Prepare phase finished");
                }
                Ok(BinaryExecutor.execute(&path, input(arguments)).await?)
            }

            WorkloadSpec::SqlScript {
                source,
                max_statements,
                policy,
            } => {
                let start = Instant::now();
                let session = self.session(job, cancel).await?;
                let lines = bounded(cancel, timeout, self.deps.scripts.open(source)).await?;
                let report = bounded(
                    cancel,
                    timeout,
                    run_statement_batch(&*session, lines, *max_statements, *policy, cancel),
                )
                .await?;
                Ok(ExecutionResult {
                    stdout: report.summary(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..Default::default()
                })
            }

            WorkloadSpec::InlineSql { statement } => {
                let start = Instant::now();
                let session = self.session(job, cancel).await?;
                let sets = bounded(cancel, timeout, execute_inline(&*session, statement)).await?;
                Ok(ExecutionResult {
                    stdout: render_record_sets(&sets),
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..Default::default()
                })
            }
        }
    }

    async fn session(
        &self,
        job: &JobDescriptor,
        cancel: &CancellationToken,
    ) -> Result<Arc<dyn SqlSession>, StageError> {
        bounded(
            cancel,
            self.profile.workload_timeout,
            self.deps.sessions.get_or_connect(&job.target),
        )
        .await
    }

    async fn publish(
        &self,
        metric: Metric,
        cancel: &CancellationToken,
    ) -> Result<Option<Metric>, StageError> {
        let sent = bounded(
            cancel,
            self.profile.workload_timeout,
            self.deps.metrics.put_metric(&metric),
        )
        .await;

        match (sent, self.profile.publish) {
            (Ok(()), _) => {
                tracing::info!(stage = %Stage::Published, name = %metric.name, "Metric published");
                Ok(Some(metric))
            }
            (Err(StageError::Publish(e)), PublishPolicy::BestEffort) => {
                tracing::warn!(error = %e, "Metric publish failed, continuing");
                Ok(None)
            }
            (Err(e), _) => Err(e),
        }
    }
}

/// Race `fut` against cancellation and a deadline.
async fn bounded<T, E>(
    cancel: &CancellationToken,
    timeout: Duration,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, StageError>
where
    StageError: From<E>,
{
    let start = Instant::now();
    let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

    tokio::select! {
        _ = cancel.cancelled() => Err(ExecutionError::Cancelled { elapsed_ms: elapsed_ms(start) }.into()),
        _ = tokio::time::sleep(timeout) => Err(ExecutionError::Timeout { elapsed_ms: elapsed_ms(start) }.into()),
        result = fut => result.map_err(StageError::from),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("stage panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("stage panicked: {s}")
    } else {
        "stage panicked".to_string()
    }
}
