//! Scripted test doubles for every external boundary.
//!
//! Used by unit tests and the integration suite; kept out of the public
//! API surface by convention, not by feature gate, so integration tests
//! can drive the full pipeline without network, browser, or model access.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{ClientError, ClientResult};
use crate::html;
use crate::traits::browser::{BrowserBackend, RenderedPage, WaitStrategy};
use crate::traits::extractor::{DocumentExtractor, ExtractedDocument};
use crate::traits::fetch::{FetchOutcome, FetchStrategy};
use crate::traits::model::StructuringModel;
use crate::traits::render::{CrawlPage, RenderClient, RenderResponse};
use crate::types::job::StrategyKind;

fn unscripted(what: &str, key: &str) -> ClientError {
    ClientError::Api {
        status: 599,
        message: format!("no scripted {} for {}", what, key),
    }
}

/// Scripted [`RenderClient`]. Responses are consumed per URL in order.
#[derive(Default)]
pub struct MockRenderClient {
    renders: Mutex<HashMap<String, VecDeque<ClientResult<RenderResponse>>>>,
    crawl_token: Mutex<Option<String>>,
    job_pages: Mutex<HashMap<String, Vec<CrawlPage>>>,
    calls: AtomicUsize,
}

impl MockRenderClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a render response for a URL.
    pub fn with_render(self, url: &str, response: ClientResult<RenderResponse>) -> Self {
        self.renders
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Token returned by `start_crawl`.
    pub fn with_crawl_token(self, token: &str) -> Self {
        *self.crawl_token.lock().unwrap() = Some(token.to_string());
        self
    }

    /// Pages returned when reattaching to an external job token.
    pub fn with_job_pages(self, token: &str, pages: Vec<CrawlPage>) -> Self {
        self.job_pages
            .lock()
            .unwrap()
            .insert(token.to_string(), pages);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderClient for MockRenderClient {
    async fn render(&self, url: &str, _timeout: Duration) -> ClientResult<RenderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.renders
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(unscripted("render", url)))
    }

    async fn start_crawl(&self, url: &str, _max_depth: usize) -> ClientResult<String> {
        self.crawl_token
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| unscripted("crawl token", url))
    }

    async fn resume_job(&self, token: &str) -> ClientResult<Vec<CrawlPage>> {
        self.job_pages
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| unscripted("job pages", token))
    }

    fn name(&self) -> &str {
        "mock-render"
    }
}

/// Scripted [`BrowserBackend`]. Responses are consumed per URL in order.
#[derive(Default)]
pub struct MockBrowserBackend {
    pages: Mutex<HashMap<String, VecDeque<ClientResult<RenderedPage>>>>,
    calls: AtomicUsize,
}

impl MockBrowserBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a rendered page (or error) for a URL.
    pub fn with_page(self, url: &str, page: ClientResult<RenderedPage>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(page);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserBackend for MockBrowserBackend {
    async fn render(
        &self,
        url: &str,
        _timeout: Duration,
        _wait: WaitStrategy,
    ) -> ClientResult<RenderedPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(unscripted("page", url)))
    }

    fn name(&self) -> &str {
        "mock-browser"
    }
}

/// [`DocumentExtractor`] returning one fixed document every call.
pub struct MockDocumentExtractor {
    document: ExtractedDocument,
    calls: AtomicUsize,
}

impl MockDocumentExtractor {
    /// Extractor that always yields the given text, marked non-OCR.
    pub fn with_text(text: &str) -> Self {
        Self::with_document(ExtractedDocument {
            text: text.to_string(),
            used_ocr: false,
        })
    }

    pub fn with_document(document: ExtractedDocument) -> Self {
        Self {
            document,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentExtractor for MockDocumentExtractor {
    async fn extract(&self, _bytes: &[u8]) -> ClientResult<ExtractedDocument> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.document.clone())
    }

    fn name(&self) -> &str {
        "mock-extractor"
    }
}

/// Scripted [`StructuringModel`]. Responses are consumed in call order
/// and every received prompt is recorded for assertions.
#[derive(Clone, Default)]
pub struct MockModel {
    inner: Arc<MockModelInner>,
}

#[derive(Default)]
struct MockModelInner {
    responses: Mutex<VecDeque<ClientResult<String>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next model response.
    pub fn with_response(self, response: ClientResult<String>) -> Self {
        self.inner.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.inner.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl StructuringModel for MockModel {
    async fn structure(&self, _schema: &serde_json::Value, content: &str) -> ClientResult<String> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .prompts
            .lock()
            .unwrap()
            .push(content.to_string());
        self.inner
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("model response", "structure")))
    }

    fn name(&self) -> &str {
        "mock-model"
    }
}

/// Scripted [`FetchStrategy`] returning one fixed outcome every call.
pub struct MockStrategy {
    kind: StrategyKind,
    outcome: Option<FetchOutcome>,
    documents_only: bool,
    calls: AtomicUsize,
}

impl MockStrategy {
    pub fn new(kind: StrategyKind) -> Self {
        Self {
            kind,
            outcome: None,
            documents_only: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Outcome returned on every attempt.
    pub fn with_outcome(mut self, outcome: FetchOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Restrict `supports` to document URLs, like the real extraction
    /// strategy.
    pub fn supporting_only_documents(mut self) -> Self {
        self.documents_only = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchStrategy for MockStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn supports(&self, url: &str) -> bool {
        !self.documents_only || html::is_document_url(url)
    }

    async fn attempt(&self, _url: &str, _timeout: Duration) -> FetchOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .unwrap_or_else(|| FetchOutcome::hard_fail("no scripted outcome"))
    }
}
