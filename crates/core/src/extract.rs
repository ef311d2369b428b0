//! Summary-line extraction from workload output.
//!
//! Workloads print free-form text. The headline number lives on a summary
//! line such as
//!
//! ```text
//! tpmC: 1234.5, efficiency: 9603.2%
//! ```
//!
//! Extraction never fails. A missing summary line or a value that does not
//! parse yields `0.0`, so format drift in the workload output cannot block
//! the pipeline step. When several summary lines are printed the last one
//! wins.

use crate::metric::{Metric, MetricIdentity};

/// Summary marker printed by go-tpc at the end of a TPC-C run.
pub const TPMC_MARKER: &str = "tpmC";

/// How to recognise and split a summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPattern {
    /// Prefix that identifies a summary line.
    pub marker: String,
    /// Separates the fields of the summary line; the value is in the first.
    pub field_delimiter: char,
    /// Separates the label from the value within the first field.
    pub value_delimiter: char,
}

impl SummaryPattern {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            field_delimiter: ',',
            value_delimiter: ':',
        }
    }

    /// go-tpc TPC-C throughput summary.
    pub fn tpmc() -> Self {
        Self::new(TPMC_MARKER)
    }

    fn is_summary_line(&self, line: &str) -> bool {
        line.len() > self.marker.len() && line.starts_with(&self.marker)
    }

    /// Value carried by one summary line, `0.0` when it does not parse.
    fn parse_value(&self, line: &str) -> f64 {
        let first_field = line.split(self.field_delimiter).next().unwrap_or_default();
        // The value sits between the first and second delimiter.
        let Some(value) = first_field.split(self.value_delimiter).nth(1) else {
            return 0.0;
        };
        let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        cleaned.parse::<f64>().unwrap_or(0.0)
    }
}

/// Scan `output` line by line and return the last summary value.
pub fn extract(output: &str, pattern: &SummaryPattern) -> f64 {
    let mut value = 0.0;
    for line in output.lines() {
        if pattern.is_summary_line(line) {
            tracing::debug!(line, "Found summary line");
            value = pattern.parse_value(line);
        }
    }
    value
}

/// Extract the summary value and wrap it in a metric.
pub fn extract_metric(output: &str, pattern: &SummaryPattern, identity: &MetricIdentity) -> Metric {
    identity.with_value(extract(output, pattern))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
