//! Headless-Chromium [`BrowserBackend`] built on `chromiumoxide`.
//!
//! Requires the `browser` feature and a local Chromium install.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::html;
use crate::traits::browser::{BrowserBackend, RenderedPage, WaitStrategy};

/// Backend that drives one shared headless Chromium instance. Pages are
/// opened per render and closed afterward.
pub struct ChromiumBackend {
    browser: Browser,
}

impl ChromiumBackend {
    /// Launch a headless Chromium and start its event handler.
    pub async fn launch() -> ClientResult<Self> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .build()
            .map_err(ClientError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ClientError::Browser(e.to_string()))?;

        // The handler must be polled for the browser to make progress
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        Ok(Self { browser })
    }

    async fn render_inner(&self, url: &str, wait: WaitStrategy) -> ClientResult<RenderedPage> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| ClientError::Browser(format!("failed to open page: {}", e)))?;

        match wait {
            WaitStrategy::NetworkIdle => {
                let _ = page.wait_for_navigation().await;
            }
            WaitStrategy::FixedDelay(delay) => {
                let _ = page.wait_for_navigation().await;
                tokio::time::sleep(delay).await;
            }
        }

        let html_content = page
            .content()
            .await
            .map_err(|e| ClientError::Browser(format!("failed to read DOM: {}", e)))?;

        let dom_text: String = page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| ClientError::Browser(format!("failed to evaluate: {}", e)))?
            .into_value()
            .unwrap_or_default();

        let title = page.get_title().await.ok().flatten();
        let forms = html::parse_forms(&html_content);

        let _ = page.close().await;

        Ok(RenderedPage {
            dom_text,
            html: html_content,
            title,
            forms,
        })
    }
}

#[async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn render(
        &self,
        url: &str,
        timeout: Duration,
        wait: WaitStrategy,
    ) -> ClientResult<RenderedPage> {
        debug!(url = %url, "chromium render");
        match tokio::time::timeout(timeout, self.render_inner(url, wait)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "chromium"
    }
}
