//! Concrete clients for the external boundaries, each behind a feature
//! gate so library consumers only compile the backends they deploy.

#[cfg(feature = "browser")]
pub mod chromium;
#[cfg(feature = "firecrawl")]
pub mod firecrawl;
#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "pdf")]
pub mod pdf;

#[cfg(feature = "browser")]
pub use chromium::ChromiumBackend;
#[cfg(feature = "firecrawl")]
pub use firecrawl::FirecrawlClient;
#[cfg(feature = "openai")]
pub use openai::OpenAiModel;
#[cfg(feature = "pdf")]
pub use pdf::PdfTextExtractor;
