//! Metrics published to the monitoring sink, and the sink seam itself.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Default namespace for benchmark metrics.
pub const NAMESPACE_BENCHMARK: &str = "Benchmark";

/// TPC-C throughput metric name.
pub const METRIC_TRANSACTIONS_PER_MINUTE: &str = "TransactionPerMinutes";

/// Dimension key identifying the TPC-C variant (value: warehouse count).
pub const DIMENSION_TPCC: &str = "tpcc";

/// Unit attached to a metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricUnit {
    Count,
    Seconds,
    Milliseconds,
    Percent,
    None,
}

impl MetricUnit {
    /// Unit name as understood by CloudWatch.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Seconds => "Seconds",
            Self::Milliseconds => "Milliseconds",
            Self::Percent => "Percent",
            Self::None => "None",
        }
    }
}

/// One data point for the monitoring sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub namespace: String,
    pub name: String,
    pub dimensions: BTreeMap<String, String>,
    pub value: f64,
    pub unit: MetricUnit,
}

/// Everything about a metric except its value; fixed per job type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricIdentity {
    pub namespace: String,
    pub name: String,
    pub dimensions: BTreeMap<String, String>,
    pub unit: MetricUnit,
}

impl MetricIdentity {
    /// TPC-C throughput, dimensioned by warehouse count.
    pub fn transactions_per_minute(namespace: &str, warehouses: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: METRIC_TRANSACTIONS_PER_MINUTE.to_string(),
            dimensions: BTreeMap::from([(DIMENSION_TPCC.to_string(), warehouses.to_string())]),
            unit: MetricUnit::Count,
        }
    }

    pub fn with_value(&self, value: f64) -> Metric {
        Metric {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            dimensions: self.dimensions.clone(),
            value,
            unit: self.unit,
        }
    }
}

/// Failure to record a metric.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("monitoring sink rejected metric {name}: {message}")]
    Rejected { name: String, message: String },

    #[error("monitoring sink unreachable: {0}")]
    Transport(String),
}

/// Monitoring sink: accepts one metric per call, no batching or retry.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn put_metric(&self, metric: &Metric) -> Result<(), PublishError>;
}
