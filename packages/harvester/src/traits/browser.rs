//! Browser-automation boundary.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ClientResult;
use crate::types::payload::FormInfo;

/// How long the backend waits before extracting the DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Wait until the network goes idle (bounded by the timeout)
    NetworkIdle,
    /// Wait a fixed delay after load
    FixedDelay(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::NetworkIdle
    }
}

/// A page rendered by a headless browser.
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// Visible text of the rendered DOM
    pub dom_text: String,

    /// Full rendered HTML
    pub html: String,

    pub title: Option<String>,

    /// Forms with their field structures
    pub forms: Vec<FormInfo>,
}

/// Backend that renders pages in a headless browser.
#[async_trait]
pub trait BrowserBackend: Send + Sync {
    /// Render the page and extract DOM text and form structures.
    async fn render(
        &self,
        url: &str,
        timeout: Duration,
        wait: WaitStrategy,
    ) -> ClientResult<RenderedPage>;

    fn name(&self) -> &str {
        "unknown"
    }
}
