//! Workload artifact acquisition.
//!
//! [`acquire`] streams an object from an [`ArtifactStore`] into a local file,
//! overwriting whatever was there, and marks it executable when asked.
//! Cleanup of the destination is the caller's job.

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWriteExt};

/// Permission bits applied to downloaded executables.
pub const EXECUTABLE_MODE: u32 = 0o770;

/// Byte stream of an artifact's content.
pub type ArtifactBody = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactFetchError {
    #[error("artifact '{0}' not found in store")]
    NotFound(String),

    #[error("artifact store request for '{key}' failed: {message}")]
    Store { key: String, message: String },

    #[error("failed writing artifact to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Content blob store keyed by name.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<ArtifactBody, ArtifactFetchError>;
}

/// Download `key` into `destination`; returns the number of bytes written.
pub async fn acquire(
    store: &dyn ArtifactStore,
    key: &str,
    destination: &Path,
    executable: bool,
) -> Result<u64, ArtifactFetchError> {
    let write_err = |source: std::io::Error| ArtifactFetchError::Write {
        path: destination.display().to_string(),
        source,
    };

    let mut body = store.fetch(key).await?;

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    // `File::create` truncates an existing file.
    let mut file = tokio::fs::File::create(destination).await.map_err(write_err)?;
    let written = tokio::io::copy(&mut body, &mut file).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;

    if executable {
        set_executable(&file).await.map_err(write_err)?;
    }
    file.sync_all().await.map_err(write_err)?;

    tracing::info!(key, path = %destination.display(), bytes = written, "Artifact downloaded");
    Ok(written)
}

#[cfg(unix)]
async fn set_executable(file: &tokio::fs::File) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(EXECUTABLE_MODE))
        .await
}

#[cfg(not(unix))]
async fn set_executable(_file: &tokio::fs::File) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    struct MapStore(HashMap<String, Vec<u8>>);

    #[async_trait]
    impl ArtifactStore for MapStore {
        async fn fetch(&self, key: &str) -> Result<ArtifactBody, ArtifactFetchError> {
            let bytes = self
                .0
                .get(key)
                .cloned()
                .ok_or_else(|| ArtifactFetchError::NotFound(key.to_string()))?;
            Ok(Box::pin(std::io::Cursor::new(bytes)))
        }
    }

    fn store(key: &str, body: &[u8]) -> MapStore {
        MapStore(HashMap::from([(key.to_string(), body.to_vec())]))
    }

    #[tokio::test]
    async fn writes_content_and_returns_size() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("nested").join("go-tpc");

        let n = acquire(&store("go-tpc", b"#!/bin/sh\n"), "go-tpc", &dest, false)
            .await
            .expect("acquire");

        assert_eq!(n, 10);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"#!/bin/sh\n");
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("go-tpc");
        tokio::fs::write(&dest, vec![b'x'; 64]).await.unwrap();

        acquire(&store("go-tpc", b"new"), "go-tpc", &dest, false)
            .await
            .expect("acquire");

        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"new");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sets_executable_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("go-tpc");
        acquire(&store("go-tpc", b"bin"), "go-tpc", &dest, true)
            .await
            .expect("acquire");

        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, EXECUTABLE_MODE);
    }

    #[tokio::test]
    async fn missing_key_propagates() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dest = dir.path().join("go-tpc");
        let err = acquire(&store("other", b""), "go-tpc", &dest, true)
            .await
            .unwrap_err();
        assert_matches!(err, ArtifactFetchError::NotFound(ref k) if k == "go-tpc");
        assert!(!dest.exists(), "nothing is written when the fetch fails");
    }
}
