//! Remote-render service boundary.
//!
//! The managed rendering/crawling service has its own long-running job
//! semantics with resume tokens. Reattaching to one of those jobs
//! (`resume_job`) is deliberately distinct from internal ledger
//! resumption: "resume our pipeline" and "reattach to their crawl job"
//! must never be conflated.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ClientResult;

/// Response from rendering a single URL remotely.
#[derive(Debug, Clone)]
pub struct RenderResponse {
    /// HTTP-style status reported by the service
    pub status: u16,

    /// Rendered page body (HTML or markdown)
    pub body: String,

    /// Whether the service actually executed JavaScript for this page
    pub rendered: bool,
}

/// One page returned by an external crawl job.
#[derive(Debug, Clone)]
pub struct CrawlPage {
    pub url: String,
    pub body: String,
    pub title: Option<String>,
}

/// Client for the external managed rendering/crawling service.
#[async_trait]
pub trait RenderClient: Send + Sync {
    /// Render one URL.
    async fn render(&self, url: &str, timeout: Duration) -> ClientResult<RenderResponse>;

    /// Start a crawl job for a site; returns the service's job token.
    async fn start_crawl(&self, url: &str, max_depth: usize) -> ClientResult<String>;

    /// Reattach to an external crawl job by token and wait for its pages.
    async fn resume_job(&self, token: &str) -> ClientResult<Vec<CrawlPage>>;

    /// Client name, for logging.
    fn name(&self) -> &str {
        "unknown"
    }
}
