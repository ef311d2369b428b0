//! Remote SQL scripts fetched over HTTP(S) and streamed line by line.
//!
//! The body is never buffered whole: bytes flow through a
//! [`StreamReader`] and lines are yielded as they complete, so a capped
//! batch stops downloading once it has read enough.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use actionrunner_core::execution::ExecutionError;
use actionrunner_db::script::{ScriptLines, ScriptSource};

/// Connect timeout for script downloads. Overall duration is bounded by
/// the job's cancellation token instead.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpScriptSource {
    client: reqwest::Client,
}

impl HttpScriptSource {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ScriptSource for HttpScriptSource {
    async fn open(&self, location: &str) -> Result<ScriptLines, ExecutionError> {
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| ExecutionError::Transport(format!("fetching script {location}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExecutionError::Transport(format!(
                "fetching script {location}: HTTP {}",
                status.as_u16()
            )));
        }

        tracing::debug!(location, "Script stream opened");

        let bytes = response.bytes_stream().map_err(std::io::Error::other);
        let lines = StreamReader::new(bytes).lines();

        let stream = futures::stream::try_unfold(lines, |mut lines| async move {
            let next = lines.next_line().await?;
            Ok::<_, std::io::Error>(next.map(|line| (line, lines)))
        });
        Ok(Box::pin(stream))
    }
}
