//! Per-invocation scratch directories.
//!
//! Each job gets its own directory under the scratch root so concurrent
//! invocations on the same host never overwrite each other's artifacts.
//! The directory name is a readable slug of the job id plus a short hash of
//! the full id, so two ids that sanitise to the same slug still differ.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::types::JobId;

/// Longest slug kept from the job id.
const MAX_SLUG_CHARS: usize = 48;

/// Hex characters of the id hash appended to the slug.
const HASH_HEX_CHARS: usize = 12;

/// A job's private scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub fn for_job(root: &Path, job_id: &JobId) -> Self {
        Self {
            dir: root.join(namespace_for(job_id)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a file inside the namespace; the name's directory parts are
    /// stripped so an artifact key like `bin/go-tpc` lands as `go-tpc`.
    pub fn file(&self, name: &str) -> PathBuf {
        let leaf = name.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or("artifact");
        self.dir.join(leaf)
    }

    /// Remove the directory and everything in it. Missing dirs are fine.
    pub async fn remove(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Directory name for `job_id`: `<slug>-<hash>`.
pub fn namespace_for(job_id: &JobId) -> String {
    let slug: String = job_id
        .as_str()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(MAX_SLUG_CHARS)
        .collect();

    let digest = Sha256::digest(job_id.as_str().as_bytes());
    let hash: String = digest
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(HASH_HEX_CHARS)
        .collect();

    format!("{slug}-{hash}")
}
