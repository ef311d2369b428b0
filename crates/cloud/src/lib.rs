//! AWS and HTTP implementations of the runner's collaborator seams.
//!
//! - [`s3::S3ArtifactStore`] serves workload artifacts.
//! - [`cloudwatch::CloudWatchMetricSink`] records extracted metrics.
//! - [`codepipeline::CodePipelineReporter`] reports job completion.
//! - [`http_script::HttpScriptSource`] streams remote SQL scripts.

pub mod cloudwatch;
pub mod codepipeline;
pub mod http_script;
pub mod s3;

use aws_config::{BehaviorVersion, SdkConfig};

/// Load the shared AWS configuration, optionally pinning the region.
///
/// Credentials and the default region come from the usual provider chain
/// (environment, profile, instance role).
pub async fn load_sdk_config(region: Option<&str>) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_sdk_s3::config::Region::new(region.to_string()));
    }
    loader.load().await
}

/// Full error chain of an SDK error, which `Display` alone omits.
pub(crate) fn describe<E>(err: &E) -> String
where
    E: std::error::Error,
{
    aws_sdk_s3::error::DisplayErrorContext(err).to_string()
}
