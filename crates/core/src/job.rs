//! Job types and the decoded job descriptor.
//!
//! A [`JobDescriptor`] is produced once per invocation by
//! [`invocation::decode`](crate::invocation::decode) and is immutable from
//! then on. It carries the orchestrator's job id, the target cluster and the
//! per-job-type settings validated at decode time.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::JobId;
use crate::workload::BenchmarkParameters;

/// TiDB's MySQL-protocol listener port.
pub const DEFAULT_TARGET_PORT: u16 = 4000;

/// User parameter carrying the statement for `sql` jobs.
pub const PARAM_SQL: &str = "sql";

// ---------------------------------------------------------------------------
// Job kinds
// ---------------------------------------------------------------------------

/// The kind of pipeline step a runner performs.
///
/// Chosen by the hosting route, never by the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Load-test the cluster with an external benchmark binary.
    Benchmark,
    /// Run a bounded batch of statements from a remote validation script.
    Check,
    /// Decode and acknowledge; proves the cluster parameters were wired.
    Verify,
    /// Execute an ad-hoc statement carried in the user parameters.
    Sql,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [Self::Benchmark, Self::Check, Self::Verify, Self::Sql];

    /// Parse from the route / configuration name.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "benchmark" => Ok(Self::Benchmark),
            "check" => Ok(Self::Check),
            "verify" => Ok(Self::Verify),
            "sql" => Ok(Self::Sql),
            other => Err(CoreError::UnknownJobType(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Benchmark => "benchmark",
            Self::Check => "check",
            Self::Verify => "verify",
            Self::Sql => "sql",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Coordinates of the database cluster under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetEndpoint {
    pub host: String,
    pub port: u16,
}

impl TargetEndpoint {
    /// Parse `host` or `host:port`. Returns `None` for a blank host.
    ///
    /// Only a single colon is treated as a port separator so bare IPv6
    /// literals pass through untouched as hosts.
    pub fn parse(raw: &str, default_port: u16) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw.matches(':').count() == 1 {
            if let Some((host, port)) = raw.split_once(':') {
                if let Ok(port) = port.parse::<u16>() {
                    if host.is_empty() {
                        return None;
                    }
                    return Some(Self {
                        host: host.to_string(),
                        port,
                    });
                }
            }
        }
        Some(Self {
            host: raw.to_string(),
            port: default_port,
        })
    }

    /// Stable key used to memoize sessions per endpoint.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for TargetEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Instance ids of the provisioned cluster, as handed over by the deploy stage.
///
/// Informational only; logged so a failed step can be traced back to the
/// machines it ran against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInventory {
    pub tidb_instance_id: Option<String>,
    pub tikv_instance_ids: Vec<String>,
}

/// Per-job-type settings validated at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSettings {
    Benchmark(BenchmarkParameters),
    Check,
    Verify,
    Sql { statement: String },
}

impl JobSettings {
    /// Whether the workload is expected to print a summary line worth
    /// extracting and publishing.
    pub fn expects_summary(&self) -> bool {
        match self {
            Self::Benchmark(params) => params.mode.runs_benchmark(),
            Self::Check | Self::Verify | Self::Sql { .. } => false,
        }
    }
}

/// Decoded, validated representation of one invocation.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub kind: JobKind,
    pub target: TargetEndpoint,
    pub cluster: ClusterInventory,
    /// Every user parameter, stringified.
    pub parameters: BTreeMap<String, String>,
    pub settings: JobSettings,
}
