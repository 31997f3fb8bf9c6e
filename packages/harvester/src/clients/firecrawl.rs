//! Firecrawl-backed [`RenderClient`].
//!
//! Requires the `firecrawl` feature.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};
use crate::security::RenderCredentials;
use crate::traits::render::{CrawlPage, RenderClient, RenderResponse};

const FIRECRAWL_API_URL: &str = "https://api.firecrawl.dev/v1";

/// Client for the Firecrawl rendering and crawling API.
pub struct FirecrawlClient {
    client: Client,
    credentials: RenderCredentials,
    /// Timeout for polling an external crawl job (seconds)
    poll_timeout_secs: u64,
    /// Interval between poll attempts (seconds)
    poll_interval_secs: u64,
}

#[derive(Serialize)]
struct ScrapeRequest {
    url: String,
    formats: Vec<String>,
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
}

#[derive(Deserialize)]
struct ScrapeData {
    html: Option<String>,
    metadata: Option<PageMetadata>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    #[serde(rename = "statusCode")]
    status_code: Option<u16>,
}

#[derive(Serialize)]
struct CrawlRequest {
    url: String,
    #[serde(rename = "maxDepth")]
    max_depth: u32,
    #[serde(rename = "scrapeOptions")]
    scrape_options: CrawlScrapeOptions,
}

#[derive(Serialize)]
struct CrawlScrapeOptions {
    formats: Vec<String>,
}

#[derive(Deserialize)]
struct CrawlStartResponse {
    success: bool,
    id: Option<String>,
}

#[derive(Deserialize)]
struct CrawlStatusResponse {
    status: String,
    data: Option<Vec<ScrapeData>>,
}

impl FirecrawlClient {
    pub fn new(credentials: RenderCredentials) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ClientError::Http(Box::new(e)))?;

        Ok(Self {
            client,
            credentials,
            poll_timeout_secs: 300,
            poll_interval_secs: 5,
        })
    }

    /// Create from the `FIRECRAWL_API_KEY` environment variable.
    pub fn from_env() -> ClientResult<Self> {
        let api_key = std::env::var("FIRECRAWL_API_KEY").map_err(|_| ClientError::Api {
            status: 0,
            message: "FIRECRAWL_API_KEY environment variable not set".to_string(),
        })?;
        Self::new(RenderCredentials::new(api_key))
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    fn base_url(&self) -> &str {
        self.credentials
            .base_url
            .as_deref()
            .unwrap_or(FIRECRAWL_API_URL)
    }

    fn map_status(status: reqwest::StatusCode, message: String) -> ClientError {
        if status.as_u16() == 429 {
            ClientError::RateLimited
        } else {
            ClientError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }

    async fn post<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> ClientResult<R> {
        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key.expose()),
            )
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, text));
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Http(Box::new(e)))
    }

    async fn get<R: for<'de> Deserialize<'de>>(&self, endpoint: &str) -> ClientResult<R> {
        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key.expose()),
            )
            .send()
            .await
            .map_err(|e| ClientError::Http(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_status(status, text));
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::Http(Box::new(e)))
    }

    fn page_from_data(data: ScrapeData) -> Option<CrawlPage> {
        let body = data.html?;
        if body.trim().is_empty() {
            return None;
        }
        let url = data.metadata.as_ref()?.source_url.clone()?;
        let title = data.metadata.and_then(|m| m.title);
        Some(CrawlPage { url, body, title })
    }
}

#[async_trait]
impl RenderClient for FirecrawlClient {
    async fn render(&self, url: &str, _timeout: Duration) -> ClientResult<RenderResponse> {
        let request = ScrapeRequest {
            url: url.to_string(),
            formats: vec!["html".to_string()],
        };
        let response: ScrapeResponse = self.post("/scrape", &request).await?;

        if !response.success {
            return Err(ClientError::Api {
                status: 0,
                message: "scrape reported failure".to_string(),
            });
        }
        let data = response.data.ok_or(ClientError::Api {
            status: 0,
            message: "scrape returned no data".to_string(),
        })?;

        let status = data
            .metadata
            .as_ref()
            .and_then(|m| m.status_code)
            .unwrap_or(200);

        Ok(RenderResponse {
            status,
            body: data.html.unwrap_or_default(),
            rendered: true,
        })
    }

    async fn start_crawl(&self, url: &str, max_depth: usize) -> ClientResult<String> {
        let request = CrawlRequest {
            url: url.to_string(),
            max_depth: max_depth as u32,
            scrape_options: CrawlScrapeOptions {
                formats: vec!["html".to_string()],
            },
        };
        let response: CrawlStartResponse = self.post("/crawl", &request).await?;

        if !response.success {
            return Err(ClientError::Api {
                status: 0,
                message: "failed to start crawl".to_string(),
            });
        }
        let token = response.id.ok_or(ClientError::Api {
            status: 0,
            message: "no crawl id returned".to_string(),
        })?;
        info!(url = %url, token = %token, "external crawl started");
        Ok(token)
    }

    async fn resume_job(&self, token: &str) -> ClientResult<Vec<CrawlPage>> {
        let max_attempts = self.poll_timeout_secs / self.poll_interval_secs.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            if attempts > max_attempts {
                return Err(ClientError::Timeout {
                    url: format!("crawl job {}", token),
                });
            }
            tokio::time::sleep(Duration::from_secs(self.poll_interval_secs)).await;

            let status: CrawlStatusResponse = self.get(&format!("/crawl/{}", token)).await?;
            match status.status.as_str() {
                "completed" => {
                    let pages: Vec<CrawlPage> = status
                        .data
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(Self::page_from_data)
                        .collect();
                    info!(token = %token, pages = pages.len(), "external crawl completed");
                    return Ok(pages);
                }
                "failed" => {
                    return Err(ClientError::Api {
                        status: 0,
                        message: format!("crawl job {} failed", token),
                    });
                }
                other => {
                    if attempts % 6 == 0 {
                        warn!(token = %token, status = %other, "crawl still in progress");
                    }
                }
            }
        }
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}
