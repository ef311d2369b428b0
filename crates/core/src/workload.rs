//! Workload descriptions: what a job runs against the target.
//!
//! The shape of the workload is fixed per job type; users only influence it
//! through the parameters validated here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::invocation::DecodeError;
use crate::job::TargetEndpoint;

/// Default cap on statements executed from a remote script.
pub const DEFAULT_MAX_STATEMENTS: usize = 10;

/// Benchmark subcommand passed to go-tpc.
pub const BENCHMARK_WORKLOAD: &str = "tpcc";

const DEFAULT_WAREHOUSES: u32 = 1;
const DEFAULT_DURATION: &str = "60s";
const DEFAULT_DATABASE: &str = "tpcc";

// ---------------------------------------------------------------------------
// WorkloadSpec
// ---------------------------------------------------------------------------

/// Error policy for statement batches.
///
/// Statement failures are logged and skipped unless `stop_on_error` is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPolicy {
    pub stop_on_error: bool,
}

/// What to run for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkloadSpec {
    /// Download `artifact_key` and spawn it.
    ///
    /// When `prepare_arguments` is set the binary is first run with those
    /// arguments; only the output of the `arguments` run is scanned.
    ExternalBinary {
        artifact_key: String,
        arguments: Vec<String>,
        prepare_arguments: Option<Vec<String>>,
    },
    /// Execute up to `max_statements` lines of the script at `source`.
    SqlScript {
        source: String,
        max_statements: usize,
        policy: StatementPolicy,
    },
    /// Execute one statement (or multi-statement batch) on the shared session.
    InlineSql { statement: String },
    /// Nothing to execute.
    None,
}

impl WorkloadSpec {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ExternalBinary { .. } => "external_binary",
            Self::SqlScript { .. } => "sql_script",
            Self::InlineSql { .. } => "inline_sql",
            Self::None => "none",
        }
    }
}

// ---------------------------------------------------------------------------
// Benchmark parameters
// ---------------------------------------------------------------------------

/// Which go-tpc phases to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkMode {
    /// Load the dataset only.
    Prepare,
    /// Run the benchmark against an already-loaded dataset.
    Run,
    /// Load, then run.
    PrepareAndRun,
}

impl BenchmarkMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "prepare" => Some(Self::Prepare),
            "run" => Some(Self::Run),
            "prepare-and-run" => Some(Self::PrepareAndRun),
            _ => None,
        }
    }

    pub fn runs_benchmark(self) -> bool {
        matches!(self, Self::Run | Self::PrepareAndRun)
    }
}

/// Validated go-tpc parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkParameters {
    pub warehouses: u32,
    /// go-tpc duration literal, e.g. `60s` or `5m`.
    pub duration: String,
    pub database: String,
    pub mode: BenchmarkMode,
    pub threads: Option<u32>,
}

impl Default for BenchmarkParameters {
    fn default() -> Self {
        Self {
            warehouses: DEFAULT_WAREHOUSES,
            duration: DEFAULT_DURATION.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            mode: BenchmarkMode::Run,
            threads: None,
        }
    }
}

impl BenchmarkParameters {
    /// Validate the benchmark fields of a decoded parameter map.
    ///
    /// Recognised keys: `warehouses`, `duration`, `database`, `mode`,
    /// `threads`. Unknown keys are ignored.
    pub fn from_parameters(params: &BTreeMap<String, String>) -> Result<Self, DecodeError> {
        let mut out = Self::default();

        if let Some(raw) = params.get("warehouses") {
            out.warehouses = parse_positive("warehouses", raw)?;
        }
        if let Some(raw) = params.get("threads") {
            out.threads = Some(parse_positive("threads", raw)?);
        }
        if let Some(raw) = params.get("duration") {
            validate_duration(raw)?;
            out.duration = raw.trim().to_string();
        }
        if let Some(raw) = params.get("database") {
            let raw = raw.trim();
            if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(DecodeError::InvalidParameter {
                    name: "database".into(),
                    reason: format!("'{raw}' is not a plain schema name"),
                });
            }
            out.database = raw.to_string();
        }
        if let Some(raw) = params.get("mode") {
            out.mode = BenchmarkMode::from_name(raw.trim()).ok_or_else(|| {
                DecodeError::InvalidParameter {
                    name: "mode".into(),
                    reason: format!("'{raw}' must be one of: prepare, run, prepare-and-run"),
                }
            })?;
        }

        Ok(out)
    }

    /// go-tpc argument vector for one phase (`"prepare"` or `"run"`).
    pub fn arguments(&self, target: &TargetEndpoint, phase: &str) -> Vec<String> {
        let mut args = vec![
            BENCHMARK_WORKLOAD.to_string(),
            "--warehouses".to_string(),
            self.warehouses.to_string(),
            "-H".to_string(),
            target.host.clone(),
            "-P".to_string(),
            target.port.to_string(),
            "-D".to_string(),
            self.database.clone(),
        ];
        if let Some(threads) = self.threads {
            args.push("-T".to_string());
            args.push(threads.to_string());
        }
        if phase == "run" {
            args.push("--time".to_string());
            args.push(self.duration.clone());
        }
        args.push(phase.to_string());
        args
    }

    /// Build the workload for these parameters.
    pub fn workload(&self, artifact_key: &str, target: &TargetEndpoint) -> WorkloadSpec {
        let (arguments, prepare_arguments) = match self.mode {
            BenchmarkMode::Prepare => (self.arguments(target, "prepare"), None),
            BenchmarkMode::Run => (self.arguments(target, "run"), None),
            BenchmarkMode::PrepareAndRun => (
                self.arguments(target, "run"),
                Some(self.arguments(target, "prepare")),
            ),
        };
        WorkloadSpec::ExternalBinary {
            artifact_key: artifact_key.to_string(),
            arguments,
            prepare_arguments,
        }
    }
}

fn parse_positive(name: &str, raw: &str) -> Result<u32, DecodeError> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(DecodeError::InvalidParameter {
            name: name.to_string(),
            reason: format!("'{raw}' is not a positive integer"),
        }),
    }
}

/// Accepts `<digits><unit>` with unit one of `s`, `m`, `h`.
fn validate_duration(raw: &str) -> Result<(), DecodeError> {
    let raw = raw.trim();
    let valid = raw.len() >= 2
        && raw.ends_with(['s', 'm', 'h'])
        && raw[..raw.len() - 1].chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(DecodeError::InvalidParameter {
            name: "duration".into(),
            reason: format!("'{raw}' must look like 60s, 5m or 1h"),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn target() -> TargetEndpoint {
        TargetEndpoint {
            host: "10.0.0.5".into(),
            port: 4000,
        }
    }

    #[test]
    fn defaults_match_stock_invocation() {
        let p = BenchmarkParameters::from_parameters(&BTreeMap::new()).unwrap();
        assert_eq!(
            p.arguments(&target(), "run"),
            vec![
                "tpcc", "--warehouses", "1", "-H", "10.0.0.5", "-P", "4000", "-D", "tpcc",
                "--time", "60s", "run"
            ]
        );
    }

    #[test]
    fn prepare_phase_has_no_time_flag() {
        let p = BenchmarkParameters::default();
        let args = p.arguments(&target(), "prepare");
        assert!(!args.contains(&"--time".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("prepare"));
    }

    #[test]
    fn overrides_are_applied() {
        let p = BenchmarkParameters::from_parameters(&params(&[
            ("warehouses", "4"),
            ("duration", "5m"),
            ("database", "bench_1"),
            ("threads", "16"),
            ("mode", "prepare-and-run"),
        ]))
        .unwrap();
        assert_eq!(p.warehouses, 4);
        assert_eq!(p.duration, "5m");
        assert_eq!(p.database, "bench_1");
        assert_eq!(p.threads, Some(16));
        assert_eq!(p.mode, BenchmarkMode::PrepareAndRun);

        let workload = p.workload("go-tpc", &target());
        assert_matches!(
            workload,
            WorkloadSpec::ExternalBinary { ref arguments, prepare_arguments: Some(ref prep), .. } => {
                assert_eq!(arguments.last().map(String::as_str), Some("run"));
                assert_eq!(prep.last().map(String::as_str), Some("prepare"));
                assert!(arguments.windows(2).any(|w| w == ["-T", "16"]));
            }
        );
    }

    #[test]
    fn rejects_bad_values() {
        for (key, value) in [
            ("warehouses", "0"),
            ("warehouses", "many"),
            ("duration", "60"),
            ("duration", "s"),
            ("database", "tpcc; drop"),
            ("mode", "cleanup"),
        ] {
            let err = BenchmarkParameters::from_parameters(&params(&[(key, value)])).unwrap_err();
            assert_matches!(err, DecodeError::InvalidParameter { ref name, .. } if name == key);
        }
    }

    #[test]
    fn only_run_modes_produce_a_summary() {
        assert!(!BenchmarkMode::Prepare.runs_benchmark());
        assert!(BenchmarkMode::Run.runs_benchmark());
        assert!(BenchmarkMode::PrepareAndRun.runs_benchmark());
    }

    #[test]
    fn benchmark_runs_an_external_binary() {
        let workload = BenchmarkParameters::default().workload("go-tpc", &target());
        assert_matches!(
            workload,
            WorkloadSpec::ExternalBinary { ref artifact_key, prepare_arguments: None, .. }
                if artifact_key == "go-tpc"
        );
        assert_eq!(workload.kind_name(), "external_binary");
        assert_eq!(WorkloadSpec::None.kind_name(), "none");
    }
}
