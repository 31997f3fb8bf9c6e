//! Document text-extraction boundary.

use async_trait::async_trait;

use crate::error::ClientResult;

/// Text recovered from a binary document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedDocument {
    pub text: String,

    /// Whether OCR produced this text (as opposed to direct extraction)
    pub used_ocr: bool,
}

/// Extracts text from downloaded document bytes (PDF and similar).
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> ClientResult<ExtractedDocument>;

    fn name(&self) -> &str {
        "unknown"
    }
}
