//! Remote-render fetch strategy (escalation slot 1).
//!
//! Delegates to the external managed rendering service. Rate limits and
//! transient 5xx responses are retriable; an empty body or a page that
//! still demands JavaScript is a signal to escalate, not to retry.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::html;
use crate::traits::fetch::{FetchOutcome, FetchStrategy, FetchedContent};
use crate::traits::render::RenderClient;
use crate::types::job::StrategyKind;

/// Body shorter than this is treated as effectively empty.
const MIN_BODY_CHARS: usize = 64;

/// Strategy backed by a [`RenderClient`].
pub struct RemoteRenderStrategy<C: RenderClient> {
    client: C,
}

impl<C: RenderClient> RemoteRenderStrategy<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Heuristic for pages the service returned un-rendered.
    fn requires_js(body: &str, rendered: bool) -> bool {
        if body.trim().len() < MIN_BODY_CHARS {
            return true;
        }
        if rendered {
            return false;
        }
        let lowered = body.to_lowercase();
        lowered.contains("enable javascript") || lowered.contains("javascript is required")
    }

    fn content_from_body(url: &str, body: String) -> FetchedContent {
        let links = Url::parse(url)
            .map(|base| html::extract_links(&base, &body))
            .unwrap_or_default();

        FetchedContent {
            text: html::html_to_text(&body),
            title: html::extract_title(&body),
            forms: html::parse_forms(&body),
            links,
            content_type: Some("text/html".to_string()),
            html: Some(body),
            ..Default::default()
        }
    }
}

#[async_trait]
impl<C: RenderClient> FetchStrategy for RemoteRenderStrategy<C> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RemoteRender
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> FetchOutcome {
        debug!(url = %url, client = self.client.name(), "remote render attempt");

        let response = match self.client.render(url, timeout).await {
            Ok(r) => r,
            Err(e) => {
                return if e.is_transient() {
                    FetchOutcome::soft_fail(e.to_string(), true)
                } else {
                    FetchOutcome::hard_fail(e.to_string())
                };
            }
        };

        match response.status {
            200..=299 => {
                if Self::requires_js(&response.body, response.rendered) {
                    // Escalate to browser automation, don't retry here
                    FetchOutcome::soft_fail("empty or JS-gated body from render service", false)
                } else {
                    FetchOutcome::success(Self::content_from_body(url, response.body))
                }
            }
            429 => FetchOutcome::soft_fail("render service rate limit", true),
            500..=599 => FetchOutcome::soft_fail(
                format!("render service returned {}", response.status),
                true,
            ),
            status => FetchOutcome::hard_fail(format!("render service returned {}", status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRenderClient;
    use crate::traits::render::RenderResponse;
    use crate::types::job::AttemptOutcome;

    const PAGE: &str = r#"
        <html><head><title>Example City</title></head>
        <body><h1>Welcome</h1>
        <p>City Council meets every third Thursday in the main chamber at city hall,
        and agendas are posted one week in advance for public review.</p>
        <a href="/agendas">Agendas</a></body></html>
    "#;

    #[tokio::test]
    async fn test_success_extracts_text_links_and_title() {
        let client = MockRenderClient::new().with_render(
            "https://example-city.gov/",
            Ok(RenderResponse {
                status: 200,
                body: PAGE.to_string(),
                rendered: true,
            }),
        );
        let strategy = RemoteRenderStrategy::new(client);

        let outcome = strategy
            .attempt("https://example-city.gov/", Duration::from_secs(10))
            .await;

        assert!(outcome.is_success());
        let content = outcome.raw_content.unwrap();
        assert!(content.text.contains("City Council"));
        assert_eq!(content.title.as_deref(), Some("Example City"));
        assert!(content
            .links
            .contains(&"https://example-city.gov/agendas".to_string()));
    }

    #[tokio::test]
    async fn test_empty_body_escalates_without_retry() {
        let client = MockRenderClient::new().with_render(
            "https://example-city.gov/calendar",
            Ok(RenderResponse {
                status: 200,
                body: String::new(),
                rendered: false,
            }),
        );
        let strategy = RemoteRenderStrategy::new(client);

        let outcome = strategy
            .attempt("https://example-city.gov/calendar", Duration::from_secs(10))
            .await;

        assert_eq!(outcome.status, AttemptOutcome::SoftFail);
        assert!(!outcome.retriable);
    }

    #[tokio::test]
    async fn test_rate_limit_is_retriable() {
        let client = MockRenderClient::new().with_render(
            "https://example-city.gov/",
            Ok(RenderResponse {
                status: 429,
                body: String::new(),
                rendered: false,
            }),
        );
        let strategy = RemoteRenderStrategy::new(client);

        let outcome = strategy
            .attempt("https://example-city.gov/", Duration::from_secs(10))
            .await;

        assert_eq!(outcome.status, AttemptOutcome::SoftFail);
        assert!(outcome.retriable);
    }

    #[tokio::test]
    async fn test_client_404_is_hard_fail() {
        let client = MockRenderClient::new().with_render(
            "https://example-city.gov/missing",
            Ok(RenderResponse {
                status: 404,
                body: String::new(),
                rendered: false,
            }),
        );
        let strategy = RemoteRenderStrategy::new(client);

        let outcome = strategy
            .attempt("https://example-city.gov/missing", Duration::from_secs(10))
            .await;

        assert_eq!(outcome.status, AttemptOutcome::HardFail);
    }
}
