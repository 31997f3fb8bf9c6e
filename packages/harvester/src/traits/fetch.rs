//! The fetch-strategy capability contract.
//!
//! Three interchangeable acquisition backends implement this one trait:
//! remote-render fetch, local browser-automation fetch, and document/text
//! extraction. The escalator selects them by priority order and never
//! branches on which backend it is talking to.

use async_trait::async_trait;
use std::time::Duration;

use crate::types::job::{AttemptOutcome, StrategyKind};
use crate::types::payload::FormInfo;

/// Raw material produced by a successful strategy attempt.
#[derive(Debug, Clone, Default)]
pub struct FetchedContent {
    /// Extracted text (page text, rendered DOM text, or document text)
    pub text: String,

    /// Source HTML, when the backend produced any
    pub html: Option<String>,

    /// Raw bytes, for document payloads (magic-byte detection)
    pub bytes: Option<Vec<u8>>,

    /// MIME type reported by the source
    pub content_type: Option<String>,

    /// Page title, when known
    pub title: Option<String>,

    /// Forms the backend extracted (browser automation fills this)
    pub forms: Vec<FormInfo>,

    /// In-page links for discovery
    pub links: Vec<String>,

    /// Whether document text came from the OCR fallback
    pub used_ocr: bool,
}

/// Outcome of one try against one backend.
///
/// A strategy never raises past its boundary: every failure mode
/// reduces to one of these values, so the escalator never special-cases
/// exceptions per backend.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: AttemptOutcome,

    /// Present only on success
    pub raw_content: Option<FetchedContent>,

    /// Whether retrying the same strategy could plausibly succeed.
    /// Meaningful only for `SoftFail`.
    pub retriable: bool,

    /// Failure description, on failure
    pub error_detail: Option<String>,
}

impl FetchOutcome {
    /// A successful fetch.
    pub fn success(content: FetchedContent) -> Self {
        Self {
            status: AttemptOutcome::Success,
            raw_content: Some(content),
            retriable: false,
            error_detail: None,
        }
    }

    /// A recoverable failure. `retriable` decides retry-same-strategy
    /// versus escalate.
    pub fn soft_fail(detail: impl Into<String>, retriable: bool) -> Self {
        Self {
            status: AttemptOutcome::SoftFail,
            raw_content: None,
            retriable,
            error_detail: Some(detail.into()),
        }
    }

    /// A permanent failure for this strategy.
    pub fn hard_fail(detail: impl Into<String>) -> Self {
        Self {
            status: AttemptOutcome::HardFail,
            raw_content: None,
            retriable: false,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AttemptOutcome::Success
    }
}

/// One acquisition backend.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Which escalation slot this strategy occupies.
    fn kind(&self) -> StrategyKind;

    /// Whether this strategy is applicable to the URL at all.
    ///
    /// Document extraction only handles document URLs; the web
    /// strategies handle everything. The escalator skips inapplicable
    /// strategies without recording an attempt.
    fn supports(&self, _url: &str) -> bool {
        true
    }

    /// Try to acquire the URL. Must not panic and must not return an
    /// error; all failures are expressed in the outcome.
    async fn attempt(&self, url: &str, timeout: Duration) -> FetchOutcome;
}
