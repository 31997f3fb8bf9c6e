//! Municipal Website Harvesting Library
//!
//! Acquires content from municipal government websites through an
//! escalating chain of fetch strategies, classifies what it finds, and
//! structures it into a schema-conformant record via a language model
//! that is re-validated deterministically on every response.
//!
//! # Design Philosophy
//!
//! **"The ledger is the pipeline"**
//!
//! - Every URL is a job with a forward-only lifecycle
//! - Every transition is durable before it is acted on
//! - A run killed at any point resumes from the ledger, not from scratch
//! - The model is an untrusted producer; validation is ours
//!
//! # Usage
//!
//! ```rust,ignore
//! use harvester::{Orchestrator, RunConfig, FileLedger, FsStore};
//! use harvester::strategies::RemoteRenderStrategy;
//! use std::sync::Arc;
//!
//! let config = RunConfig::new(["https://example-city.gov/"]).with_max_depth(2);
//! let ledger = Arc::new(FileLedger::open(config.output_dir.join("ledger.jsonl"))?);
//! let store = Arc::new(FsStore::new(&config.output_dir)?);
//! let strategies = vec![Arc::new(RemoteRenderStrategy::new(render_client)) as _];
//!
//! let orchestrator = Orchestrator::new(config, ledger, store, strategies, model);
//! let summary = orchestrator.run().await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Boundary abstractions (fetch, ledger, store, model)
//! - [`types`] - Jobs, payloads, targets, and the output schema
//! - [`escalator`] - Per-URL strategy escalation state machine
//! - [`classifier`] - Pure-function content classification
//! - [`structuring`] - Prompting, validation, and repair retries
//! - [`orchestrator`] - Worker pool and run lifecycle
//! - [`security`] - Credential handling
//! - [`testing`] - Mock implementations for testing

pub mod classifier;
pub mod clients;
pub mod error;
pub mod escalator;
pub mod html;
pub mod ledger;
pub mod orchestrator;
pub mod security;
pub mod stores;
pub mod strategies;
pub mod structuring;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{
    ClientError, HarvestError, LedgerError, Result, StoreError, StructuringError,
};
pub use traits::{
    browser::{BrowserBackend, RenderedPage, WaitStrategy},
    extractor::{DocumentExtractor, ExtractedDocument},
    fetch::{FetchOutcome, FetchStrategy, FetchedContent},
    ledger::JobLedger,
    model::StructuringModel,
    render::{CrawlPage, RenderClient, RenderResponse},
    store::{raw_key, structured_failure_key, structured_key, ArtifactStore},
};
pub use types::{
    config::RunConfig,
    job::{AttemptOutcome, FetchAttempt, JobId, JobRecord, JobState, StrategyKind},
    payload::{ContentKind, FormField, FormInfo, FormType, RawPayload},
    record::{SignupInfo, StructuredRecord},
    target::Target,
};

pub use classifier::{classify, Classification, CONFIDENCE_FLOOR};
pub use escalator::{EscalationResult, Escalator};
pub use ledger::{FileLedger, MemoryLedger};
pub use orchestrator::{Orchestrator, RunSummary};
pub use security::{ModelCredentials, RenderCredentials, SecretString};
pub use stores::{FsStore, MemoryStore};
pub use strategies::{BrowserStrategy, DocumentStrategy, RemoteRenderStrategy};
pub use structuring::StructuringEngine;

#[cfg(feature = "browser")]
pub use clients::ChromiumBackend;
#[cfg(feature = "firecrawl")]
pub use clients::FirecrawlClient;
#[cfg(feature = "openai")]
pub use clients::OpenAiModel;
#[cfg(feature = "pdf")]
pub use clients::PdfTextExtractor;
