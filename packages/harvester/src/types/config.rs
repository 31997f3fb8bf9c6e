//! Run configuration.
//!
//! A `RunConfig` is built once at startup and passed to the orchestrator
//! at construction. It is immutable for the lifetime of the run, so
//! concurrent runs with different configurations never interfere.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one harvest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Seed URLs, one per target site
    pub targets: Vec<String>,

    /// Maximum link-following depth within each target's domain
    /// (0 = seed page only)
    pub max_depth: usize,

    /// Per-fetch-attempt timeout (seconds)
    pub timeout_secs: u64,

    /// Retry budget for retriable failures within one strategy
    pub retry_attempts: usize,

    /// Base delay for exponential backoff between retries (milliseconds)
    pub backoff_base_ms: u64,

    /// Number of concurrent workers processing independent URLs
    pub concurrency: usize,

    /// Repair-retry budget for schema-invalid structuring responses
    pub repair_attempts: usize,

    /// Root directory for the ledger and artifact store
    pub output_dir: PathBuf,

    /// Restrict structuring input to form-bearing and signup payloads
    pub forms_only: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            max_depth: 2,
            timeout_secs: 45,
            retry_attempts: 3,
            backoff_base_ms: 1_000,
            concurrency: 4,
            repair_attempts: 2,
            output_dir: PathBuf::from("harvest_output"),
            forms_only: false,
        }
    }
}

impl RunConfig {
    /// Create a config for a set of target sites.
    pub fn new(targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            targets: targets.into_iter().map(|t| t.into()).collect(),
            ..Default::default()
        }
    }

    /// Set the maximum crawl depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the per-attempt fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Set the per-strategy retry budget.
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the backoff base delay.
    pub fn with_backoff_base_ms(mut self, ms: u64) -> Self {
        self.backoff_base_ms = ms;
        self
    }

    /// Set worker concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the schema-repair retry budget.
    pub fn with_repair_attempts(mut self, attempts: usize) -> Self {
        self.repair_attempts = attempts;
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Restrict structuring to form-bearing and signup content.
    pub fn forms_only(mut self) -> Self {
        self.forms_only = true;
        self
    }

    /// The per-attempt timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate required settings; run-fatal if invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.targets.is_empty() {
            return Err("no target URLs configured".into());
        }
        for target in &self.targets {
            if url::Url::parse(target).is_err() {
                return Err(format!("invalid target URL: {}", target));
            }
        }
        Ok(())
    }
}
