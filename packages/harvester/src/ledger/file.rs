//! Durable append-only JSONL ledger.
//!
//! Every mutation is serialized as one JSON line, appended, and fsynced
//! before the call returns. Opening replays the file through the same
//! `apply` used for live writes, so a ledger that replays cleanly is by
//! construction one whose every transition was legal.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{apply, incomplete, LedgerEvent};
use crate::error::{LedgerError, LedgerResult};
use crate::traits::ledger::JobLedger;
use crate::types::job::{FetchAttempt, JobId, JobRecord, JobState};

struct Inner {
    file: tokio::fs::File,
    jobs: HashMap<JobId, JobRecord>,
}

/// File-backed ledger. One instance owns the file for the whole run.
pub struct FileLedger {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FileLedger {
    /// Open (or create) a ledger file and replay its events.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut jobs = HashMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let event: LedgerEvent =
                    serde_json::from_str(&line).map_err(|e| LedgerError::Corrupt {
                        line: idx + 1,
                        reason: e.to_string(),
                    })?;
                apply(&mut jobs, event).map_err(|e| LedgerError::Corrupt {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            }
            info!(path = %path.display(), jobs = jobs.len(), "replayed ledger");
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file: tokio::fs::File::from_std(file),
                jobs,
            }),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate, persist, then apply. The line is fsynced before the
    /// in-memory map changes, and never written if apply would reject it.
    /// Writes go through tokio's file handle, so the fsync lands on the
    /// blocking pool instead of stalling a fetch worker.
    async fn commit(inner: &mut Inner, event: LedgerEvent) -> LedgerResult<()> {
        // Transition check happens before the write so a rejected event
        // never reaches the file
        if let LedgerEvent::Advanced { job_id, state, .. } = &event {
            let job = inner.jobs.get(job_id).ok_or(LedgerError::UnknownJob {
                job_id: job_id.to_string(),
            })?;
            if !job.state.can_advance_to(*state) {
                return Err(LedgerError::InvalidTransition {
                    job_id: job_id.to_string(),
                    from: job.state,
                    to: *state,
                });
            }
        }

        let mut line = serde_json::to_string(&event)?;
        line.push('\n');
        inner.file.write_all(line.as_bytes()).await?;
        inner.file.flush().await?;
        inner.file.sync_all().await?;

        debug!(event = %line.trim_end(), "ledger event committed");
        apply(&mut inner.jobs, event)
    }
}

#[async_trait]
impl JobLedger for FileLedger {
    async fn create(&self, url: &str, site_url: &str) -> LedgerResult<JobRecord> {
        let record = JobRecord::new(url, site_url);
        let mut inner = self.inner.lock().await;
        Self::commit(
            &mut inner,
            LedgerEvent::Created {
                record: record.clone(),
            },
        )
        .await?;
        Ok(record)
    }

    async fn get(&self, job_id: &JobId) -> LedgerResult<Option<JobRecord>> {
        Ok(self.inner.lock().await.jobs.get(job_id).cloned())
    }

    async fn record_attempt(&self, job_id: &JobId, attempt: FetchAttempt) -> LedgerResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.jobs.contains_key(job_id) {
            return Err(LedgerError::UnknownJob {
                job_id: job_id.to_string(),
            });
        }
        Self::commit(
            &mut inner,
            LedgerEvent::AttemptRecorded {
                job_id: job_id.clone(),
                attempt,
                at: chrono::Utc::now(),
            },
        )
        .await
    }

    async fn advance(
        &self,
        job_id: &JobId,
        new_state: JobState,
        detail: Option<String>,
    ) -> LedgerResult<()> {
        let mut inner = self.inner.lock().await;
        Self::commit(
            &mut inner,
            LedgerEvent::Advanced {
                job_id: job_id.clone(),
                state: new_state,
                detail,
                at: chrono::Utc::now(),
            },
        )
        .await
    }

    async fn set_structured_ref(&self, job_id: &JobId, artifact_key: &str) -> LedgerResult<()> {
        let mut inner = self.inner.lock().await;
        if !inner.jobs.contains_key(job_id) {
            return Err(LedgerError::UnknownJob {
                job_id: job_id.to_string(),
            });
        }
        Self::commit(
            &mut inner,
            LedgerEvent::StructuredRefSet {
                job_id: job_id.clone(),
                artifact_key: artifact_key.to_string(),
                at: chrono::Utc::now(),
            },
        )
        .await
    }

    async fn load_incomplete(&self) -> LedgerResult<Vec<JobRecord>> {
        Ok(incomplete(&self.inner.lock().await.jobs))
    }

    async fn load_all(&self) -> LedgerResult<Vec<JobRecord>> {
        Ok(self.inner.lock().await.jobs.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::StrategyKind;
    use std::io::Write;

    #[tokio::test]
    async fn test_replay_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let job_id = {
            let ledger = FileLedger::open(&path).unwrap();
            let job = ledger
                .create("https://example-city.gov/", "https://example-city.gov/")
                .await
                .unwrap();
            ledger
                .advance(&job.job_id, JobState::InProgress, None)
                .await
                .unwrap();
            let attempt = FetchAttempt::success(
                &job.url,
                StrategyKind::RemoteRender,
                chrono::Utc::now(),
                format!("raw/{}.json", job.job_id),
            );
            ledger.record_attempt(&job.job_id, attempt).await.unwrap();
            ledger
                .advance(&job.job_id, JobState::Fetched, None)
                .await
                .unwrap();
            job.job_id
        };

        let reopened = FileLedger::open(&path).unwrap();
        let got = reopened.get(&job_id).await.unwrap().unwrap();
        assert_eq!(got.state, JobState::Fetched);
        assert_eq!(got.attempts.len(), 1);
        assert!(got.raw_payload_ref.is_some());
    }

    #[tokio::test]
    async fn test_rejected_transition_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let ledger = FileLedger::open(&path).unwrap();
        let job = ledger
            .create("https://example-city.gov/", "https://example-city.gov/")
            .await
            .unwrap();

        let before = std::fs::metadata(&path).unwrap().len();
        let err = ledger
            .advance(&job.job_id, JobState::Classified, None)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), before);

        // Reopening still replays cleanly
        drop(ledger);
        let reopened = FileLedger::open(&path).unwrap();
        let got = reopened.get(&job.job_id).await.unwrap().unwrap();
        assert_eq!(got.state, JobState::Pending);
    }

    #[tokio::test]
    async fn test_corrupt_line_reported_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = FileLedger::open(&path).unwrap();
            ledger
                .create("https://example-city.gov/", "https://example-city.gov/")
                .await
                .unwrap();
        }
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        f.write_all(b"{ not json\n").unwrap();
        drop(f);

        match FileLedger::open(&path) {
            Err(LedgerError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_incomplete_ordering_is_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::open(dir.path().join("ledger.jsonl")).unwrap();

        let a = ledger
            .create("https://example-city.gov/a", "https://example-city.gov/")
            .await
            .unwrap();
        let b = ledger
            .create("https://example-city.gov/b", "https://example-city.gov/")
            .await
            .unwrap();

        let incomplete = ledger.load_incomplete().await.unwrap();
        assert_eq!(incomplete[0].job_id, a.job_id);
        assert_eq!(incomplete[1].job_id, b.job_id);
    }
}
