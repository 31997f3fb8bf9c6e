//! Job lifecycle types.
//!
//! A job tracks one URL's acquisition-through-structuring lifecycle.
//! Its state only moves forward through the fixed total order
//! `pending < in_progress < fetched < classified < structured`, or
//! terminates at `failed`. The ledger enforces this; these types define it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Generate a fresh job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Fetched,
    Classified,
    Structured,
    Failed,
}

impl JobState {
    /// Position in the forward-only order. `Failed` is terminal and
    /// outside the order.
    pub fn rank(&self) -> Option<u8> {
        match self {
            JobState::Pending => Some(0),
            JobState::InProgress => Some(1),
            JobState::Fetched => Some(2),
            JobState::Classified => Some(3),
            JobState::Structured => Some(4),
            JobState::Failed => None,
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Structured | JobState::Failed)
    }

    /// Whether `next` is a legal transition from this state.
    ///
    /// Legal transitions are the immediate successor in the order, or
    /// `Failed` from any non-terminal state. Backward and skipped
    /// transitions are rejected.
    pub fn can_advance_to(&self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == JobState::Failed {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(from), Some(to)) => to == from + 1,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::InProgress => "in_progress",
            JobState::Fetched => "fetched",
            JobState::Classified => "classified",
            JobState::Structured => "structured",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Which acquisition backend produced (or attempted) a payload.
///
/// The variants are ordered by escalation priority: each later strategy
/// is strictly more expensive than the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    RemoteRender,
    BrowserAutomation,
    DocumentExtraction,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StrategyKind::RemoteRender => "remote_render",
            StrategyKind::BrowserAutomation => "browser_automation",
            StrategyKind::DocumentExtraction => "document_extraction",
        };
        f.write_str(s)
    }
}

/// Final outcome of one strategy's attempt on a URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Content acquired and accepted by the completeness check
    Success,
    /// Recoverable failure (escalate, or retry if it was retriable)
    SoftFail,
    /// Permanent failure for this strategy
    HardFail,
}

/// One recorded (url, strategy) attempt. Immutable once recorded.
///
/// The escalator creates exactly one per attempted strategy, in
/// escalation order; retries of retriable failures happen inside the
/// attempt and surface only in `error_detail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchAttempt {
    pub url: String,
    pub strategy: StrategyKind,
    pub started_at: DateTime<Utc>,
    pub outcome: AttemptOutcome,

    /// Artifact key of the payload this attempt produced, on success
    pub raw_payload_ref: Option<String>,

    /// Failure detail, including how many tries were spent
    pub error_detail: Option<String>,
}

impl FetchAttempt {
    /// Record a successful attempt.
    pub fn success(
        url: impl Into<String>,
        strategy: StrategyKind,
        started_at: DateTime<Utc>,
        raw_payload_ref: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            strategy,
            started_at,
            outcome: AttemptOutcome::Success,
            raw_payload_ref: Some(raw_payload_ref.into()),
            error_detail: None,
        }
    }

    /// Record a failed attempt.
    pub fn failure(
        url: impl Into<String>,
        strategy: StrategyKind,
        started_at: DateTime<Utc>,
        outcome: AttemptOutcome,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            strategy,
            started_at,
            outcome,
            raw_payload_ref: None,
            error_detail: Some(detail.into()),
        }
    }
}

/// The resumable unit: one URL's acquisition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,

    /// The URL this job fetches
    pub url: String,

    /// Seed URL of the owning target site
    pub site_url: String,

    pub state: JobState,

    /// Attempts in escalation order
    pub attempts: Vec<FetchAttempt>,

    /// Artifact key of the accepted raw payload
    pub raw_payload_ref: Option<String>,

    /// Artifact key of the site's structured record
    pub structured_ref: Option<String>,

    /// Last error kind and detail, for targeted re-runs
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a pending job for a URL.
    pub fn new(url: impl Into<String>, site_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            url: url.into(),
            site_url: site_url.into(),
            state: JobState::Pending,
            attempts: Vec::new(),
            raw_payload_ref: None,
            structured_ref: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this job still needs its fetch stage.
    ///
    /// Any record already at `fetched` or later is skipped for fetching
    /// on resume and only advanced through remaining stages.
    pub fn needs_fetch(&self) -> bool {
        matches!(self.state, JobState::Pending | JobState::InProgress)
    }
}
