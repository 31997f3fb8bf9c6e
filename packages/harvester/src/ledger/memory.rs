//! In-memory job ledger for tests and one-shot runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{apply, incomplete, LedgerEvent};
use crate::error::LedgerResult;
use crate::traits::ledger::JobLedger;
use crate::types::job::{FetchAttempt, JobId, JobRecord, JobState};

/// Non-durable ledger. Enforces the same transition rules as
/// [`super::FileLedger`] but keeps everything in a `HashMap`.
#[derive(Default)]
pub struct MemoryLedger {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobLedger for MemoryLedger {
    async fn create(&self, url: &str, site_url: &str) -> LedgerResult<JobRecord> {
        let record = JobRecord::new(url, site_url);
        let mut jobs = self.jobs.write().await;
        apply(
            &mut jobs,
            LedgerEvent::Created {
                record: record.clone(),
            },
        )?;
        Ok(record)
    }

    async fn get(&self, job_id: &JobId) -> LedgerResult<Option<JobRecord>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn record_attempt(&self, job_id: &JobId, attempt: FetchAttempt) -> LedgerResult<()> {
        let mut jobs = self.jobs.write().await;
        apply(
            &mut jobs,
            LedgerEvent::AttemptRecorded {
                job_id: job_id.clone(),
                attempt,
                at: chrono::Utc::now(),
            },
        )
    }

    async fn advance(
        &self,
        job_id: &JobId,
        new_state: JobState,
        detail: Option<String>,
    ) -> LedgerResult<()> {
        let mut jobs = self.jobs.write().await;
        apply(
            &mut jobs,
            LedgerEvent::Advanced {
                job_id: job_id.clone(),
                state: new_state,
                detail,
                at: chrono::Utc::now(),
            },
        )
    }

    async fn set_structured_ref(&self, job_id: &JobId, artifact_key: &str) -> LedgerResult<()> {
        let mut jobs = self.jobs.write().await;
        apply(
            &mut jobs,
            LedgerEvent::StructuredRefSet {
                job_id: job_id.clone(),
                artifact_key: artifact_key.to_string(),
                at: chrono::Utc::now(),
            },
        )
    }

    async fn load_incomplete(&self) -> LedgerResult<Vec<JobRecord>> {
        Ok(incomplete(&*self.jobs.read().await))
    }

    async fn load_all(&self) -> LedgerResult<Vec<JobRecord>> {
        Ok(self.jobs.read().await.values().cloned().collect())
    }
}
