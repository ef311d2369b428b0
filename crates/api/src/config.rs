use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use actionrunner_core::job::{JobKind, TargetEndpoint};
use actionrunner_core::workload::{StatementPolicy, DEFAULT_MAX_STATEMENTS};
use actionrunner_db::mysql::TargetCredentials;
use actionrunner_pipeline::profile::{
    DEFAULT_BENCHMARK_ARTIFACT, DEFAULT_CHECK_SCRIPT_URL, DEFAULT_WORKLOAD_TIMEOUT,
};
use actionrunner_pipeline::{JobProfile, PublishPolicy};

/// HTTP server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `900`). Keep it above the
    /// workload timeout.
    pub request_timeout_secs: u64,
    /// Grace period for in-flight invocations at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default   |
    /// |-------------------------|-----------|
    /// | `HOST`                  | `0.0.0.0` |
    /// | `PORT`                  | `3000`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `900`     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`      |
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_env("PORT", 3000),
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 900),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 30),
        }
    }
}

/// Runner configuration: collaborators, job profiles and target credentials.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Overrides the SDK's region resolution when set.
    pub aws_region: Option<String>,
    pub artifact_bucket: String,
    pub benchmark_artifact_key: String,
    pub scratch_dir: PathBuf,
    pub workload_timeout: Duration,
    pub check_script_url: String,
    pub check_max_statements: usize,
    pub check_stop_on_error: bool,
    pub benchmark_publish_policy: PublishPolicy,
    pub metric_namespace: String,
    pub target_port: u16,
    pub target_user: String,
    pub target_password: String,
    pub target_database: String,
    /// Target host for direct `/sql` requests.
    pub sql_default_target: Option<String>,
    /// Idle time after which a target session is dropped.
    pub session_idle_ttl: Duration,
}

impl RunnerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `AWS_REGION`               | SDK provider chain      |
    /// | `ARTIFACT_BUCKET`          | `tidb-tests`            |
    /// | `BENCHMARK_ARTIFACT_KEY`   | `go-tpc`                |
    /// | `SCRATCH_DIR`              | `/tmp/actionrunner`     |
    /// | `WORKLOAD_TIMEOUT_SECS`    | `600`                   |
    /// | `CHECK_SCRIPT_URL`         | tidb-tests check.sql.6  |
    /// | `CHECK_MAX_STATEMENTS`     | `10`                    |
    /// | `CHECK_STOP_ON_ERROR`      | `false`                 |
    /// | `BENCHMARK_PUBLISH_POLICY` | `required`              |
    /// | `METRIC_NAMESPACE`         | `Benchmark`             |
    /// | `TARGET_DB_PORT`           | `4000`                  |
    /// | `TARGET_DB_USER`           | `root`                  |
    /// | `TARGET_DB_PASSWORD`       | empty                   |
    /// | `TARGET_DB_NAME`           | `test`                  |
    /// | `SQL_DEFAULT_TARGET`       | unset                   |
    /// | `SESSION_IDLE_TTL_SECS`    | `3600`                  |
    pub fn from_env() -> Self {
        let benchmark_publish_policy = PublishPolicy::from_name(&env_or(
            "BENCHMARK_PUBLISH_POLICY",
            "required",
        ))
        .unwrap_or_else(|e| panic!("BENCHMARK_PUBLISH_POLICY: {e}"));

        Self {
            aws_region: optional_env("AWS_REGION"),
            artifact_bucket: env_or("ARTIFACT_BUCKET", "tidb-tests"),
            benchmark_artifact_key: env_or("BENCHMARK_ARTIFACT_KEY", DEFAULT_BENCHMARK_ARTIFACT),
            scratch_dir: PathBuf::from(env_or("SCRATCH_DIR", "/tmp/actionrunner")),
            workload_timeout: Duration::from_secs(parse_env(
                "WORKLOAD_TIMEOUT_SECS",
                DEFAULT_WORKLOAD_TIMEOUT.as_secs(),
            )),
            check_script_url: env_or("CHECK_SCRIPT_URL", DEFAULT_CHECK_SCRIPT_URL),
            check_max_statements: parse_env("CHECK_MAX_STATEMENTS", DEFAULT_MAX_STATEMENTS),
            check_stop_on_error: parse_env("CHECK_STOP_ON_ERROR", false),
            benchmark_publish_policy,
            metric_namespace: env_or("METRIC_NAMESPACE", "Benchmark"),
            target_port: parse_env("TARGET_DB_PORT", 4000),
            target_user: env_or("TARGET_DB_USER", "root"),
            target_password: env_or("TARGET_DB_PASSWORD", ""),
            target_database: env_or("TARGET_DB_NAME", "test"),
            sql_default_target: optional_env("SQL_DEFAULT_TARGET"),
            session_idle_ttl: Duration::from_secs(parse_env("SESSION_IDLE_TTL_SECS", 3600)),
        }
    }

    /// The configured profile for `kind`.
    pub fn profile(&self, kind: JobKind) -> JobProfile {
        let profile = match kind {
            JobKind::Benchmark => JobProfile::benchmark(&self.benchmark_artifact_key)
                .with_publish_policy(self.benchmark_publish_policy)
                .with_metric_namespace(&self.metric_namespace),
            JobKind::Check => JobProfile::check(&self.check_script_url).with_statement_limits(
                self.check_max_statements,
                StatementPolicy {
                    stop_on_error: self.check_stop_on_error,
                },
            ),
            JobKind::Verify => JobProfile::verify(),
            JobKind::Sql => JobProfile::sql(),
        };
        profile
            .with_timeout(self.workload_timeout)
            .with_target_port(self.target_port)
    }

    pub fn credentials(&self) -> TargetCredentials {
        TargetCredentials {
            user: self.target_user.clone(),
            password: self.target_password.clone(),
            database: self.target_database.clone(),
            ..Default::default()
        }
    }

    /// Parsed `/sql` target, if configured.
    pub fn sql_target(&self) -> Option<TargetEndpoint> {
        self.sql_default_target
            .as_deref()
            .and_then(|raw| TargetEndpoint::parse(raw, self.target_port))
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `name` or fall back to `default`; a malformed value aborts start-up.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid value: {e}")),
        Err(_) => default,
    }
}
