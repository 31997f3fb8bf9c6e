//! Job ledger implementations.
//!
//! Both implementations share one event vocabulary and one `apply`
//! function, so the in-memory ledger used by tests enforces exactly the
//! transition rules the durable file ledger enforces.

pub mod file;
pub mod memory;

pub use file::FileLedger;
pub use memory::MemoryLedger;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{LedgerError, LedgerResult};
use crate::types::job::{AttemptOutcome, FetchAttempt, JobId, JobRecord, JobState};

/// One ledger mutation. The file ledger persists these as JSONL; the
/// state of a job is the fold of its events in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum LedgerEvent {
    Created {
        record: JobRecord,
    },
    AttemptRecorded {
        job_id: JobId,
        attempt: FetchAttempt,
        at: DateTime<Utc>,
    },
    Advanced {
        job_id: JobId,
        state: JobState,
        detail: Option<String>,
        at: DateTime<Utc>,
    },
    StructuredRefSet {
        job_id: JobId,
        artifact_key: String,
        at: DateTime<Utc>,
    },
}

/// Apply one event to the job map, enforcing transition rules.
///
/// Used both for live mutation and for replay, so a ledger file can only
/// replay into states that were legal to write in the first place.
pub(crate) fn apply(
    jobs: &mut HashMap<JobId, JobRecord>,
    event: LedgerEvent,
) -> LedgerResult<()> {
    match event {
        LedgerEvent::Created { record } => {
            jobs.insert(record.job_id.clone(), record);
            Ok(())
        }
        LedgerEvent::AttemptRecorded { job_id, attempt, at } => {
            let job = jobs.get_mut(&job_id).ok_or(LedgerError::UnknownJob {
                job_id: job_id.to_string(),
            })?;
            if attempt.outcome == AttemptOutcome::Success {
                job.raw_payload_ref = attempt.raw_payload_ref.clone();
            }
            job.attempts.push(attempt);
            job.updated_at = at;
            Ok(())
        }
        LedgerEvent::Advanced {
            job_id,
            state,
            detail,
            at,
        } => {
            let job = jobs.get_mut(&job_id).ok_or(LedgerError::UnknownJob {
                job_id: job_id.to_string(),
            })?;
            if !job.state.can_advance_to(state) {
                return Err(LedgerError::InvalidTransition {
                    job_id: job_id.to_string(),
                    from: job.state,
                    to: state,
                });
            }
            job.state = state;
            if state == JobState::Failed {
                job.error = detail;
            }
            job.updated_at = at;
            Ok(())
        }
        LedgerEvent::StructuredRefSet {
            job_id,
            artifact_key,
            at,
        } => {
            let job = jobs.get_mut(&job_id).ok_or(LedgerError::UnknownJob {
                job_id: job_id.to_string(),
            })?;
            job.structured_ref = Some(artifact_key);
            job.updated_at = at;
            Ok(())
        }
    }
}

/// Jobs not yet terminal, oldest first. Shared by both ledgers so the
/// resume path sees a stable order.
pub(crate) fn incomplete(jobs: &HashMap<JobId, JobRecord>) -> Vec<JobRecord> {
    let mut out: Vec<JobRecord> = jobs
        .values()
        .filter(|j| !j.state.is_terminal())
        .cloned()
        .collect();
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    out
}
