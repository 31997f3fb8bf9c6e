//! Browser-automation fetch strategy (escalation slot 2).
//!
//! Renders the page in a headless browser, waits for network idle or a
//! bounded timeout, and extracts the rendered DOM text plus `<form>`
//! structures. Tried whenever the remote renderer reports "requires JS"
//! or produced a form-bearing page without usable field detail.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::html;
use crate::traits::browser::{BrowserBackend, WaitStrategy};
use crate::traits::fetch::{FetchOutcome, FetchStrategy, FetchedContent};
use crate::types::job::StrategyKind;

/// Strategy backed by a [`BrowserBackend`].
pub struct BrowserStrategy<B: BrowserBackend> {
    backend: B,
    wait: WaitStrategy,
}

impl<B: BrowserBackend> BrowserStrategy<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            wait: WaitStrategy::NetworkIdle,
        }
    }

    /// Override the wait strategy.
    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl<B: BrowserBackend> FetchStrategy for BrowserStrategy<B> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BrowserAutomation
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> FetchOutcome {
        debug!(url = %url, backend = self.backend.name(), "browser render attempt");

        let page = match self.backend.render(url, timeout, self.wait).await {
            Ok(p) => p,
            Err(e) => {
                return if e.is_transient() {
                    FetchOutcome::soft_fail(e.to_string(), true)
                } else {
                    FetchOutcome::hard_fail(e.to_string())
                };
            }
        };

        if page.dom_text.trim().is_empty() && page.forms.is_empty() {
            return FetchOutcome::soft_fail("browser rendered an empty DOM", false);
        }

        let links = Url::parse(url)
            .map(|base| html::extract_links(&base, &page.html))
            .unwrap_or_default();

        // Backends that don't extract forms themselves still get the
        // regex pass over the rendered HTML
        let forms = if page.forms.is_empty() {
            html::parse_forms(&page.html)
        } else {
            page.forms
        };

        FetchOutcome::success(FetchedContent {
            text: page.dom_text,
            title: page.title,
            forms,
            links,
            content_type: Some("text/html".to_string()),
            html: Some(page.html),
            ..Default::default()
        })
    }
}
