//! Typed errors for the harvester library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling. Per-job errors never
//! abort a run; only ledger corruption and configuration errors are
//! surfaced as run-fatal by the orchestrator.

use thiserror::Error;

use crate::types::job::JobState;

/// Errors that can occur during harvest operations.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Job ledger operation failed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Structuring stage failed
    #[error("structuring failed: {0}")]
    Structuring(#[from] StructuringError),

    /// Artifact store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// External client failed
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Configuration error (run-fatal)
    #[error("config error: {0}")]
    Config(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

/// Errors raised by external clients (render service, browser backend,
/// document extractor, structuring model transport).
///
/// Fetch strategies map these into `FetchOutcome` values; a `ClientError`
/// never crosses the `FetchStrategy` boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// API returned a non-success status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Request or render timed out
    #[error("timeout fetching: {url}")]
    Timeout { url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Browser automation failed
    #[error("browser error: {0}")]
    Browser(String),

    /// Document text extraction failed
    #[error("extraction error: {0}")]
    Extraction(String),
}

impl ClientError {
    /// Whether a retry of the same backend could plausibly succeed.
    ///
    /// Rate limits, timeouts, and 5xx responses are transient; everything
    /// else advances the escalator to the next strategy.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::RateLimited | ClientError::Timeout { .. } => true,
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors from the job ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Transition violates the forward-only state order
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },

    /// Job id not present in the ledger
    #[error("unknown job: {job_id}")]
    UnknownJob { job_id: String },

    /// Underlying I/O failure
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger file could not be replayed
    #[error("corrupt ledger at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },

    /// Event serialization failed
    #[error("ledger serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors from the structuring engine.
#[derive(Debug, Error)]
pub enum StructuringError {
    /// Model call failed (transport or provider error)
    #[error("model error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Repair retries exhausted; raw response preserved for reprocessing
    #[error("structuring failed after {attempts} attempts")]
    RetriesExhausted { attempts: usize, raw_response: String },

    /// No classified payloads to structure
    #[error("no content to structure")]
    NoContent,
}

impl StructuringError {
    /// The last raw model response, when one exists.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            StructuringError::RetriesExhausted { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// Errors from the artifact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key already written (the store is write-once)
    #[error("artifact already exists: {key}")]
    AlreadyExists { key: String },

    /// Underlying I/O failure
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for external client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Result type alias for artifact store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::RateLimited.is_transient());
        assert!(ClientError::Timeout {
            url: "https://example-city.gov".into()
        }
        .is_transient());
        assert!(ClientError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
        assert!(!ClientError::Api {
            status: 404,
            message: "not found".into()
        }
        .is_transient());
        assert!(!ClientError::InvalidUrl {
            url: "not-a-url".into()
        }
        .is_transient());
    }

    #[test]
    fn test_structuring_error_preserves_raw_response() {
        let err = StructuringError::RetriesExhausted {
            attempts: 3,
            raw_response: "{\"partial\": true}".into(),
        };
        assert_eq!(err.raw_response(), Some("{\"partial\": true}"));
        assert_eq!(StructuringError::NoContent.raw_response(), None);
    }
}
