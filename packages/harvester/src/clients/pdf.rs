//! PDF text extraction via `pdf-extract`.
//!
//! Requires the `pdf` feature. Direct text-layer extraction only; an OCR
//! fallback is a separate [`DocumentExtractor`] supplied by the deployer.

use async_trait::async_trait;

use crate::error::{ClientError, ClientResult};
use crate::traits::extractor::{DocumentExtractor, ExtractedDocument};

/// Extracts the text layer from PDF bytes.
#[derive(Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> ClientResult<ExtractedDocument> {
        let bytes = bytes.to_vec();
        // pdf-extract is synchronous and CPU-bound
        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes)
        })
        .await
        .map_err(|e| ClientError::Extraction(format!("extraction task failed: {}", e)))?
        .map_err(|e| ClientError::Extraction(e.to_string()))?;

        Ok(ExtractedDocument {
            text,
            used_ocr: false,
        })
    }

    fn name(&self) -> &str {
        "pdf-extract"
    }
}
