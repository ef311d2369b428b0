//! Invocation decoding.
//!
//! The orchestrator posts a CodePipeline job event. The only parts the
//! runner needs are the job id and the `UserParameters` string, which is
//! itself JSON carrying the target cluster coordinates and job-specific
//! fields:
//!
//! ```json
//! {
//!   "CodePipeline.job": {
//!     "id": "c0d76431-b0e7-xmpl-97e3-e8ee786eb6f6",
//!     "data": {
//!       "actionConfiguration": {
//!         "configuration": {
//!           "UserParameters": "{\"TiDBPublicIp\": \"3.17.206.94\"}"
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Decoding happens in two steps so a bad parameter string can still be
//! reported against its job id: [`decode_envelope`] then
//! [`decode_parameters`]. [`decode`] chains both.

use std::collections::BTreeMap;

use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::job::{
    ClusterInventory, JobDescriptor, JobKind, JobSettings, TargetEndpoint, DEFAULT_TARGET_PORT,
    PARAM_SQL,
};
use crate::types::JobId;
use crate::workload::BenchmarkParameters;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors produced while decoding an invocation payload.
///
/// None of these are retried: a malformed payload is a caller bug.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed invocation payload: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    #[error("invocation payload carries no job id")]
    MissingJobId,

    #[error("malformed user parameters: {0}")]
    MalformedParameters(String),

    #[error("user parameters carry no target endpoint")]
    MissingTarget,

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// Wire structures
// ---------------------------------------------------------------------------

/// Top-level CodePipeline event.
#[derive(Debug, Deserialize)]
pub struct CodePipelineEvent {
    #[serde(rename = "CodePipeline.job")]
    pub job: PipelineJob,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineJob {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub data: JobData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobData {
    #[serde(default)]
    pub action_configuration: ActionConfiguration,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionConfiguration {
    #[serde(default)]
    pub configuration: ActionSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActionSettings {
    #[serde(rename = "UserParameters", default)]
    pub user_parameters: Option<String>,
}

/// Cluster coordinates every job type requires.
#[derive(Debug, Deserialize, Validate)]
struct ClusterParameters {
    #[serde(rename = "TiDBPublicIp", alias = "targetEndpoint", default)]
    #[validate(custom(function = "validate_host"))]
    tidb_public_ip: String,
    #[serde(rename = "TiDBInstanceID", default)]
    tidb_instance_id: Option<String>,
    #[serde(rename = "TiKV1InstanceID", default)]
    tikv1_instance_id: Option<String>,
    #[serde(rename = "TiKV2InstanceID", default)]
    tikv2_instance_id: Option<String>,
}

fn validate_host(host: &str) -> Result<(), ValidationError> {
    if host.trim().is_empty() {
        return Err(ValidationError::new("blank_host"));
    }
    if host.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(ValidationError::new("invalid_host"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// The outer layer of an invocation: enough to address a completion callback.
#[derive(Debug, Clone)]
pub struct InvocationEnvelope {
    pub job_id: JobId,
    pub user_parameters: Option<String>,
}

/// Parse the event envelope and extract the job id.
pub fn decode_envelope(raw: &[u8]) -> Result<InvocationEnvelope, DecodeError> {
    let event: CodePipelineEvent =
        serde_json::from_slice(raw).map_err(DecodeError::MalformedEnvelope)?;
    let job_id = JobId::new(event.job.id).ok_or(DecodeError::MissingJobId)?;
    Ok(InvocationEnvelope {
        job_id,
        user_parameters: event.job.data.action_configuration.configuration.user_parameters,
    })
}

/// Decode the nested parameter string into a descriptor for `kind`.
///
/// `default_port` applies when the target carries no explicit port.
pub fn decode_parameters(
    job_id: JobId,
    kind: JobKind,
    user_parameters: Option<&str>,
    default_port: u16,
) -> Result<JobDescriptor, DecodeError> {
    let raw = user_parameters.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(DecodeError::MissingTarget);
    }

    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| DecodeError::MalformedParameters(e.to_string()))?;
    let object = value
        .as_object()
        .ok_or_else(|| DecodeError::MalformedParameters("expected a JSON object".into()))?;

    let parameters = stringify_parameters(object)?;

    let cluster: ClusterParameters = serde_json::from_value(value.clone())
        .map_err(|e| DecodeError::MalformedParameters(e.to_string()))?;
    if cluster.validate().is_err() {
        return Err(if cluster.tidb_public_ip.trim().is_empty() {
            DecodeError::MissingTarget
        } else {
            DecodeError::InvalidParameter {
                name: "TiDBPublicIp".into(),
                reason: format!("'{}' is not a host name", cluster.tidb_public_ip),
            }
        });
    }
    let target = TargetEndpoint::parse(&cluster.tidb_public_ip, default_port)
        .ok_or(DecodeError::MissingTarget)?;

    let settings = match kind {
        JobKind::Benchmark => JobSettings::Benchmark(BenchmarkParameters::from_parameters(&parameters)?),
        JobKind::Check => JobSettings::Check,
        JobKind::Verify => JobSettings::Verify,
        JobKind::Sql => {
            let statement = parameters
                .get(PARAM_SQL)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| DecodeError::InvalidParameter {
                    name: PARAM_SQL.into(),
                    reason: "a non-empty statement is required".into(),
                })?;
            JobSettings::Sql {
                statement: statement.to_string(),
            }
        }
    };

    Ok(JobDescriptor {
        job_id,
        kind,
        target,
        cluster: ClusterInventory {
            tidb_instance_id: cluster.tidb_instance_id,
            tikv_instance_ids: [cluster.tikv1_instance_id, cluster.tikv2_instance_id]
                .into_iter()
                .flatten()
                .collect(),
        },
        parameters,
        settings,
    })
}

/// Decode a full invocation payload for `kind`, targeting the stock port.
pub fn decode(raw: &[u8], kind: JobKind) -> Result<JobDescriptor, DecodeError> {
    let envelope = decode_envelope(raw)?;
    decode_parameters(
        envelope.job_id,
        kind,
        envelope.user_parameters.as_deref(),
        DEFAULT_TARGET_PORT,
    )
}

/// Flatten the parameter object into a string map.
///
/// Scalars are stringified, `null`s dropped; nested arrays or objects are
/// rejected because no job type defines a structured parameter.
fn stringify_parameters(
    object: &serde_json::Map<String, serde_json::Value>,
) -> Result<BTreeMap<String, String>, DecodeError> {
    let mut out = BTreeMap::new();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                return Err(DecodeError::InvalidParameter {
                    name: key.clone(),
                    reason: "must be a string, number or boolean".into(),
                });
            }
        };
        out.insert(key.clone(), text);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
