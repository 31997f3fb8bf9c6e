//! Document-extraction fetch strategy (escalation slot 3).
//!
//! Downloads the binary and extracts text directly; the OCR fallback is
//! invoked only when direct extraction yields near-empty output. Only
//! applicable to document URLs (PDF and similar).

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::html;
use crate::traits::extractor::DocumentExtractor;
use crate::traits::fetch::{FetchOutcome, FetchStrategy, FetchedContent};
use crate::types::job::StrategyKind;

/// Direct extraction yielding fewer characters than this triggers OCR.
const NEAR_EMPTY_CHARS: usize = 32;

/// Strategy backed by a [`DocumentExtractor`], with an optional OCR
/// fallback extractor.
pub struct DocumentStrategy {
    client: reqwest::Client,
    extractor: Arc<dyn DocumentExtractor>,
    ocr: Option<Arc<dyn DocumentExtractor>>,
}

impl DocumentStrategy {
    pub fn new(extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self {
            client: reqwest::Client::new(),
            extractor,
            ocr: None,
        }
    }

    /// Attach an OCR fallback extractor.
    pub fn with_ocr(mut self, ocr: Arc<dyn DocumentExtractor>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// Use a custom HTTP client for downloads.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn download(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<(Vec<u8>, Option<String>), FetchOutcome> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchOutcome::soft_fail(format!("document download timeout: {}", e), true)
                } else {
                    FetchOutcome::hard_fail(format!("document download failed: {}", e))
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchOutcome::soft_fail(
                format!("document server returned {}", status),
                true,
            ));
        }
        if !status.is_success() {
            return Err(FetchOutcome::hard_fail(format!(
                "document server returned {}",
                status
            )));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchOutcome::hard_fail(format!("document body read failed: {}", e)))?;

        Ok((bytes.to_vec(), content_type))
    }

    /// Extract text from downloaded bytes, invoking the OCR fallback
    /// only when direct extraction is near-empty.
    async fn extract_from_bytes(
        &self,
        url: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> FetchOutcome {
        let mut extracted = match self.extractor.extract(&bytes).await {
            Ok(doc) => doc,
            Err(e) => return FetchOutcome::hard_fail(format!("text extraction failed: {}", e)),
        };

        if extracted.text.trim().len() < NEAR_EMPTY_CHARS {
            if let Some(ocr) = &self.ocr {
                debug!(url = %url, "direct extraction near-empty, invoking OCR fallback");
                match ocr.extract(&bytes).await {
                    Ok(doc) => extracted = doc,
                    Err(e) => warn!(url = %url, error = %e, "OCR fallback failed"),
                }
            }
        }

        if extracted.text.trim().len() < NEAR_EMPTY_CHARS {
            return FetchOutcome::hard_fail("document yielded no extractable text");
        }

        FetchOutcome::success(FetchedContent {
            text: extracted.text,
            content_type: content_type.or_else(|| Some("application/pdf".to_string())),
            used_ocr: extracted.used_ocr,
            bytes: Some(bytes),
            ..Default::default()
        })
    }
}

#[async_trait]
impl FetchStrategy for DocumentStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DocumentExtraction
    }

    fn supports(&self, url: &str) -> bool {
        html::is_document_url(url)
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> FetchOutcome {
        debug!(url = %url, extractor = self.extractor.name(), "document extraction attempt");

        let (bytes, content_type) = match self.download(url, timeout).await {
            Ok(ok) => ok,
            Err(outcome) => return outcome,
        };

        self.extract_from_bytes(url, bytes, content_type).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDocumentExtractor;
    use crate::traits::extractor::ExtractedDocument;

    #[test]
    fn test_supports_only_document_urls() {
        let strategy = DocumentStrategy::new(Arc::new(MockDocumentExtractor::with_text(
            "ignored",
        )));

        assert!(strategy.supports("https://example-city.gov/budget.pdf"));
        assert!(!strategy.supports("https://example-city.gov/budget"));
    }

    #[tokio::test]
    async fn test_direct_extraction_skips_ocr() {
        let ocr = Arc::new(MockDocumentExtractor::with_document(ExtractedDocument {
            text: "ocr text that should not be used".into(),
            used_ocr: true,
        }));
        let strategy = DocumentStrategy::new(Arc::new(MockDocumentExtractor::with_text(
            "Ordinance 2024-01: Water rates are adjusted effective March 1.",
        )))
        .with_ocr(ocr.clone());

        let outcome = strategy
            .extract_from_bytes("https://example-city.gov/ord.pdf", b"%PDF-1.7".to_vec(), None)
            .await;

        assert!(outcome.is_success());
        let content = outcome.raw_content.unwrap();
        assert!(content.text.contains("Ordinance"));
        assert!(!content.used_ocr);
        assert_eq!(ocr.call_count(), 0);
    }

    #[tokio::test]
    async fn test_ocr_fallback_on_near_empty_extraction() {
        let ocr = Arc::new(MockDocumentExtractor::with_document(ExtractedDocument {
            text: "Scanned agenda: Planning Commission, April 4, 7pm, Council Chambers."
                .into(),
            used_ocr: true,
        }));
        let strategy = DocumentStrategy::new(Arc::new(MockDocumentExtractor::with_text("")))
            .with_ocr(ocr.clone());

        let outcome = strategy
            .extract_from_bytes(
                "https://example-city.gov/scan.pdf",
                b"%PDF-1.4".to_vec(),
                Some("application/pdf".into()),
            )
            .await;

        assert!(outcome.is_success());
        let content = outcome.raw_content.unwrap();
        assert!(content.used_ocr);
        assert!(content.text.contains("Planning Commission"));
        assert_eq!(ocr.call_count(), 1);
    }

    #[tokio::test]
    async fn test_no_text_and_no_ocr_is_hard_fail() {
        let strategy = DocumentStrategy::new(Arc::new(MockDocumentExtractor::with_text("")));

        let outcome = strategy
            .extract_from_bytes("https://example-city.gov/blank.pdf", vec![0u8; 8], None)
            .await;

        assert_eq!(outcome.status, crate::types::job::AttemptOutcome::HardFail);
    }
}
