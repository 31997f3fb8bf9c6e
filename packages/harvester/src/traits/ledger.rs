//! Job-ledger boundary.
//!
//! The ledger is the single shared mutable store of the pipeline. All
//! mutation goes through `record_attempt` and `advance`, both atomic
//! with respect to a given job id. Implementations must be durable:
//! every mutation is flushed before the call returns, so a crash after a
//! call returns never loses that transition, and a crash during the call
//! leaves the prior state intact.

use async_trait::async_trait;

use crate::error::LedgerResult;
use crate::types::job::{FetchAttempt, JobId, JobRecord, JobState};

/// Durable, append-only record of per-URL acquisition state.
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Create a pending job for a URL. Returns the new record.
    async fn create(&self, url: &str, site_url: &str) -> LedgerResult<JobRecord>;

    /// Fetch a job by id.
    async fn get(&self, job_id: &JobId) -> LedgerResult<Option<JobRecord>>;

    /// Append one fetch attempt to a job. A successful attempt also sets
    /// the job's `raw_payload_ref`.
    async fn record_attempt(&self, job_id: &JobId, attempt: FetchAttempt) -> LedgerResult<()>;

    /// Advance a job's state. Rejects with `InvalidTransition` any move
    /// violating the forward-only order, leaving prior state unchanged.
    /// `detail` carries the error kind for `Failed` transitions.
    async fn advance(
        &self,
        job_id: &JobId,
        new_state: JobState,
        detail: Option<String>,
    ) -> LedgerResult<()>;

    /// Point a job at its site's structured artifact.
    async fn set_structured_ref(&self, job_id: &JobId, artifact_key: &str) -> LedgerResult<()>;

    /// All jobs not in `{structured, failed}`. The resume path picks up
    /// exactly these.
    async fn load_incomplete(&self) -> LedgerResult<Vec<JobRecord>>;

    /// All jobs, for summaries and tests.
    async fn load_all(&self) -> LedgerResult<Vec<JobRecord>>;
}
