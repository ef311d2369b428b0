//! Domain logic for the pipeline action runners.
//!
//! Everything here is free of AWS and database dependencies: invocation
//! decoding, job descriptors, workload descriptions, output extraction,
//! metric and outcome types, artifact acquisition, scratch namespaces and
//! subprocess execution. The collaborator seams ([`artifact::ArtifactStore`],
//! [`metric::MetricSink`], [`outcome::JobReporter`]) are defined here and
//! implemented by the `cloud` crate.

pub mod artifact;
pub mod error;
pub mod execution;
pub mod extract;
pub mod invocation;
pub mod job;
pub mod metric;
pub mod outcome;
pub mod scratch;
pub mod scripting;
pub mod types;
pub mod workload;
