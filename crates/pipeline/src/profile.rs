//! Per-job-type configuration of the runner.
//!
//! A profile fixes everything about a job type that the invocation cannot
//! change: which workload shape runs, how its output is scanned, and what
//! happens when the metric cannot be published.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use actionrunner_core::error::CoreError;
use actionrunner_core::extract::SummaryPattern;
use actionrunner_core::job::{JobDescriptor, JobKind, JobSettings, DEFAULT_TARGET_PORT};
use actionrunner_core::metric::{MetricIdentity, NAMESPACE_BENCHMARK};
use actionrunner_core::workload::{StatementPolicy, WorkloadSpec, DEFAULT_MAX_STATEMENTS};

/// Default deadline for one workload.
pub const DEFAULT_WORKLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Default location of the check script.
pub const DEFAULT_CHECK_SCRIPT_URL: &str =
    "https://tidb-tests.s3.us-east-2.amazonaws.com/check_new/check.sql.6";

/// Default key of the benchmark binary.
pub const DEFAULT_BENCHMARK_ARTIFACT: &str = "go-tpc";

/// What a failed metric publish means for the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishPolicy {
    /// Publish failure fails the job.
    Required,
    /// Publish failure is logged; the job still succeeds.
    BestEffort,
    /// Nothing is extracted or published.
    Skip,
}

impl PublishPolicy {
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "required" => Ok(Self::Required),
            "best_effort" => Ok(Self::BestEffort),
            "skip" => Ok(Self::Skip),
            other => Err(CoreError::Validation(format!(
                "Unknown publish policy '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobProfile {
    pub kind: JobKind,
    pub workload_timeout: Duration,
    pub publish: PublishPolicy,
    /// Object key of the benchmark binary.
    pub artifact_key: String,
    pub summary: SummaryPattern,
    pub metric_namespace: String,
    /// Script resource for check jobs.
    pub script_url: String,
    pub max_statements: usize,
    pub statement_policy: StatementPolicy,
    /// Port used when the decoded target names none.
    pub target_port: u16,
}

impl JobProfile {
    fn base(kind: JobKind, publish: PublishPolicy) -> Self {
        Self {
            kind,
            workload_timeout: DEFAULT_WORKLOAD_TIMEOUT,
            publish,
            artifact_key: DEFAULT_BENCHMARK_ARTIFACT.to_string(),
            summary: SummaryPattern::tpmc(),
            metric_namespace: NAMESPACE_BENCHMARK.to_string(),
            script_url: DEFAULT_CHECK_SCRIPT_URL.to_string(),
            max_statements: DEFAULT_MAX_STATEMENTS,
            statement_policy: StatementPolicy::default(),
            target_port: DEFAULT_TARGET_PORT,
        }
    }

    /// go-tpc load test; the tpmC summary is published as a metric.
    pub fn benchmark(artifact_key: impl Into<String>) -> Self {
        Self {
            artifact_key: artifact_key.into(),
            ..Self::base(JobKind::Benchmark, PublishPolicy::Required)
        }
    }

    /// Bounded run of a remote validation script.
    pub fn check(script_url: impl Into<String>) -> Self {
        Self {
            script_url: script_url.into(),
            ..Self::base(JobKind::Check, PublishPolicy::Skip)
        }
    }

    /// Decode and report only.
    pub fn verify() -> Self {
        Self::base(JobKind::Verify, PublishPolicy::Skip)
    }

    /// Caller-supplied statement on the shared session.
    pub fn sql() -> Self {
        Self::base(JobKind::Sql, PublishPolicy::Skip)
    }

    /// Default profile for `kind`.
    pub fn for_kind(kind: JobKind) -> Self {
        match kind {
            JobKind::Benchmark => Self::benchmark(DEFAULT_BENCHMARK_ARTIFACT),
            JobKind::Check => Self::check(DEFAULT_CHECK_SCRIPT_URL),
            JobKind::Verify => Self::verify(),
            JobKind::Sql => Self::sql(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.workload_timeout = timeout;
        self
    }

    pub fn with_publish_policy(mut self, publish: PublishPolicy) -> Self {
        self.publish = publish;
        self
    }

    pub fn with_metric_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metric_namespace = namespace.into();
        self
    }

    pub fn with_target_port(mut self, port: u16) -> Self {
        self.target_port = port;
        self
    }

    pub fn with_statement_limits(mut self, max_statements: usize, policy: StatementPolicy) -> Self {
        self.max_statements = max_statements;
        self.statement_policy = policy;
        self
    }

    /// The workload for a decoded job of this profile's type.
    pub fn workload(&self, job: &JobDescriptor) -> WorkloadSpec {
        match &job.settings {
            JobSettings::Benchmark(params) => params.workload(&self.artifact_key, &job.target),
            JobSettings::Check => WorkloadSpec::SqlScript {
                source: self.script_url.clone(),
                max_statements: self.max_statements,
                policy: self.statement_policy,
            },
            JobSettings::Verify => WorkloadSpec::None,
            JobSettings::Sql { statement } => WorkloadSpec::InlineSql {
                statement: statement.clone(),
            },
        }
    }

    /// Identity of the metric to extract, if this job produces one.
    pub fn metric_identity(&self, job: &JobDescriptor) -> Option<MetricIdentity> {
        if self.publish == PublishPolicy::Skip || !job.settings.expects_summary() {
            return None;
        }
        match &job.settings {
            JobSettings::Benchmark(params) => Some(MetricIdentity::transactions_per_minute(
                &self.metric_namespace,
                &params.warehouses.to_string(),
            )),
            _ => None,
        }
    }
}
