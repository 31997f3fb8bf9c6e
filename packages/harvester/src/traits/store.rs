//! Artifact-store boundary.
//!
//! A write-once key→blob store for raw and structured JSON, addressed by
//! job id. Archival packaging and remote-bucket upload live behind this
//! boundary and outside this crate.

use async_trait::async_trait;

use crate::error::StoreResult;

/// Write-once blob store.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Write a blob under a key. Fails with `AlreadyExists` if the key
    /// was written before; artifacts are immutable.
    async fn put(&self, key: &str, bytes: &[u8]) -> StoreResult<()>;

    /// Read a blob back, if present.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Whether a key has been written.
    async fn exists(&self, key: &str) -> StoreResult<bool>;
}

/// Artifact key for a job's raw payload.
pub fn raw_key(job_id: &crate::types::job::JobId) -> String {
    format!("raw/{}.json", job_id)
}

/// Artifact key for a site's structured record, addressed by the site's
/// seed job id.
pub fn structured_key(job_id: &crate::types::job::JobId) -> String {
    format!("structured/{}.json", job_id)
}

/// Artifact key for a preserved best-effort model response after
/// structuring failed.
pub fn structured_failure_key(job_id: &crate::types::job::JobId) -> String {
    format!("structured/{}.failed.json", job_id)
}
