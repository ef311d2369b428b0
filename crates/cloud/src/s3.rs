//! Artifact store backed by an S3 bucket.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;

use actionrunner_core::artifact::{ArtifactBody, ArtifactFetchError, ArtifactStore};

use crate::describe;

pub struct S3ArtifactStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn from_conf(config: &aws_config::SdkConfig, bucket: impl Into<String>) -> Self {
        Self::new(aws_sdk_s3::Client::new(config), bucket)
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn fetch(&self, key: &str) -> Result<ArtifactBody, ArtifactFetchError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify(key, e))?;

        tracing::debug!(bucket = %self.bucket, key, "Artifact object opened");
        Ok(Box::pin(output.body.into_async_read()))
    }
}

fn classify(key: &str, err: SdkError<GetObjectError>) -> ArtifactFetchError {
    if err
        .as_service_error()
        .is_some_and(GetObjectError::is_no_such_key)
    {
        return ArtifactFetchError::NotFound(key.to_string());
    }
    ArtifactFetchError::Store {
        key: key.to_string(),
        message: describe(&err),
    }
}
