//! Run orchestration.
//!
//! Drives every target site through fetch, classification, and
//! structuring. Independent URLs are fetched by a bounded worker pool;
//! all shared state lives in the ledger and the artifact store, so a run
//! killed at any point resumes from the last durable transition.
//!
//! Per-job failures never abort a run. Only configuration errors and
//! ledger failures are run-fatal.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::error::{HarvestError, Result};
use crate::escalator::{EscalationResult, Escalator};
use crate::html;
use crate::structuring::StructuringEngine;
use crate::traits::fetch::{FetchStrategy, FetchedContent};
use crate::traits::ledger::JobLedger;
use crate::traits::model::StructuringModel;
use crate::traits::render::RenderClient;
use crate::traits::store::{raw_key, structured_failure_key, structured_key, ArtifactStore};
use crate::types::config::RunConfig;
use crate::types::job::{AttemptOutcome, FetchAttempt, JobId, JobRecord, JobState, StrategyKind};
use crate::types::payload::RawPayload;
use crate::types::target::Target;

/// What a run accomplished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub sites: usize,
    pub jobs_total: usize,
    pub jobs_structured: usize,
    pub jobs_failed: usize,
    /// Jobs found already terminal in the ledger at startup
    pub jobs_skipped: usize,
    pub records_written: usize,
    pub elapsed_ms: u64,
    pub cancelled: bool,
}

enum FetchPhase {
    Fetched { job_id: JobId, payload: RawPayload },
    Failed,
    Cancelled,
}

/// Coordinates the full pipeline for a set of target sites.
pub struct Orchestrator<M: StructuringModel> {
    config: RunConfig,
    ledger: Arc<dyn JobLedger>,
    store: Arc<dyn ArtifactStore>,
    escalator: Escalator,
    engine: StructuringEngine<M>,
    cancel: CancellationToken,
}

impl<M: StructuringModel> Orchestrator<M> {
    pub fn new(
        config: RunConfig,
        ledger: Arc<dyn JobLedger>,
        store: Arc<dyn ArtifactStore>,
        strategies: Vec<Arc<dyn FetchStrategy>>,
        model: M,
    ) -> Self {
        let escalator = Escalator::new(strategies)
            .with_timeout(config.timeout())
            .with_retry_attempts(config.retry_attempts)
            .with_backoff_base(std::time::Duration::from_millis(config.backoff_base_ms));
        let engine = StructuringEngine::new(model)
            .with_repair_attempts(config.repair_attempts)
            .with_forms_only(config.forms_only);

        Self {
            config,
            ledger,
            store,
            escalator,
            engine,
            cancel: CancellationToken::new(),
        }
    }

    /// Token for cooperative shutdown: cancelling stops new fetches while
    /// in-flight ledger writes complete.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline over all configured targets, resuming any
    /// incomplete jobs found in the ledger.
    pub async fn run(&self) -> Result<RunSummary> {
        let started = std::time::Instant::now();
        self.config.validate().map_err(HarvestError::Config)?;

        let existing = self.ledger.load_all().await?;
        if !existing.is_empty() {
            let incomplete = existing.iter().filter(|j| !j.state.is_terminal()).count();
            info!(
                known_jobs = existing.len(),
                incomplete = incomplete,
                "resuming from existing ledger"
            );
        }

        let mut summary = RunSummary {
            jobs_skipped: existing.iter().filter(|j| j.state.is_terminal()).count(),
            ..RunSummary::default()
        };
        for seed in self.config.targets.clone() {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            self.harvest_site(&seed, &existing, &mut summary).await?;
        }

        summary.cancelled |= self.cancel.is_cancelled();
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            sites = summary.sites,
            jobs = summary.jobs_total,
            structured = summary.jobs_structured,
            failed = summary.jobs_failed,
            skipped = summary.jobs_skipped,
            records = summary.records_written,
            elapsed_ms = summary.elapsed_ms,
            cancelled = summary.cancelled,
            "run complete"
        );
        Ok(summary)
    }

    /// Reattach to an external crawl job by its service token and run the
    /// remainder of the pipeline over the pages it returns.
    ///
    /// Distinct from ledger resumption: the token belongs to the remote
    /// rendering service, and its pages arrive already fetched.
    pub async fn resume_external(
        &self,
        client: &dyn RenderClient,
        token: &str,
    ) -> Result<RunSummary> {
        let started = std::time::Instant::now();
        let pages = client.resume_job(token).await?;
        info!(token = %token, pages = pages.len(), "reattached to external crawl job");

        let mut summary = RunSummary::default();
        let Some(first) = pages.first() else {
            return Ok(summary);
        };
        let site_url = first.url.clone();
        summary.sites = 1;

        let mut classified = Vec::new();
        let mut payloads = Vec::new();

        for page in &pages {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            summary.jobs_total += 1;

            let job = self.ledger.create(&page.url, &site_url).await?;
            self.ledger
                .advance(&job.job_id, JobState::InProgress, None)
                .await?;

            let content = FetchedContent {
                text: html::html_to_text(&page.body),
                forms: html::parse_forms(&page.body),
                title: page.title.clone(),
                content_type: Some("text/html".to_string()),
                html: Some(page.body.clone()),
                ..Default::default()
            };
            let classification = classify(&content);
            let mut payload =
                RawPayload::new(&page.url, content.text.clone(), StrategyKind::RemoteRender)
                    .with_forms(content.forms.clone())
                    .with_content_type("text/html");
            payload.kinds = classification.kinds;

            let key = raw_key(&job.job_id);
            self.store
                .put(&key, &serde_json::to_vec_pretty(&payload)?)
                .await?;
            self.ledger
                .record_attempt(
                    &job.job_id,
                    FetchAttempt::success(
                        &page.url,
                        StrategyKind::RemoteRender,
                        chrono::Utc::now(),
                        &key,
                    ),
                )
                .await?;
            self.ledger
                .advance(&job.job_id, JobState::Fetched, None)
                .await?;
            self.ledger
                .advance(&job.job_id, JobState::Classified, None)
                .await?;

            classified.push(job.job_id);
            payloads.push(payload);
        }

        if !self.cancel.is_cancelled() {
            if let Some(seed_job_id) = classified.first().cloned() {
                self.structure_site(&site_url, &seed_job_id, &classified, &payloads, &mut summary)
                    .await?;
            }
        }
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Fetch, classify, and structure one target site.
    async fn harvest_site(
        &self,
        seed: &str,
        existing: &[JobRecord],
        summary: &mut RunSummary,
    ) -> Result<()> {
        info!(site = %seed, "harvesting site");
        summary.sites += 1;

        let mut target = Target::new(seed, self.config.max_depth);
        let mut frontier: Vec<JobRecord> = Vec::new();
        let mut classified: Vec<JobId> = Vec::new();
        let mut payloads: Vec<RawPayload> = Vec::new();
        let mut seed_job_id: Option<JobId> = None;

        // Pick up where the ledger left off for this site. All known
        // URLs are registered first so link re-expansion below never
        // duplicates a job the ledger already holds.
        let site_jobs: Vec<&JobRecord> =
            existing.iter().filter(|j| j.site_url == seed).collect();
        for job in &site_jobs {
            target.discover(job.url.clone());
            if job.url == seed {
                seed_job_id = Some(job.job_id.clone());
            }
        }
        for job in site_jobs {
            if job.needs_fetch() {
                frontier.push(job.clone());
            } else if matches!(job.state, JobState::Fetched | JobState::Classified) {
                if let Some(payload) = self.load_payload(job).await? {
                    if job.state == JobState::Fetched {
                        self.ledger
                            .advance(&job.job_id, JobState::Classified, None)
                            .await?;
                    }
                    // Re-expand the persisted links: the prior run may
                    // have died between classifying this page and
                    // creating its children
                    if target.max_depth > 0 {
                        for link in &payload.links {
                            if target.in_domain(link) && target.discover(link.clone()) {
                                frontier.push(self.ledger.create(link, seed).await?);
                            }
                        }
                    }
                    summary.jobs_total += 1;
                    classified.push(job.job_id.clone());
                    payloads.push(payload);
                }
            }
        }

        if seed_job_id.is_none() {
            let job = self.ledger.create(seed, seed).await?;
            seed_job_id = Some(job.job_id.clone());
            frontier.push(job);
        }
        let seed_job_id = seed_job_id.ok_or_else(|| {
            HarvestError::Config(format!("no seed job for site {}", seed))
        })?;

        // Breadth-first over depth levels; each level is one concurrent
        // batch so discovery at depth N completes before N+1 starts
        let mut depth = 0;
        while !frontier.is_empty() {
            let batch = std::mem::take(&mut frontier);
            summary.jobs_total += batch.len();
            debug!(site = %seed, depth = depth, batch = batch.len(), "fetching level");

            let outcomes: Vec<Result<FetchPhase>> = stream::iter(batch)
                .map(|job| self.fetch_one(job))
                .buffer_unordered(self.config.concurrency.max(1))
                .collect()
                .await;

            for outcome in outcomes {
                match outcome? {
                    FetchPhase::Fetched { job_id, payload } => {
                        if depth < target.max_depth {
                            for link in &payload.links {
                                if target.in_domain(link) && target.discover(link.clone()) {
                                    let job = self.ledger.create(link, seed).await?;
                                    frontier.push(job);
                                }
                            }
                        }
                        classified.push(job_id);
                        payloads.push(payload);
                    }
                    FetchPhase::Failed => summary.jobs_failed += 1,
                    FetchPhase::Cancelled => summary.cancelled = true,
                }
            }

            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }
            depth += 1;
        }

        self.structure_site(seed, &seed_job_id, &classified, &payloads, summary)
            .await
    }

    /// Drive one job through escalation and record every transition.
    async fn fetch_one(&self, job: JobRecord) -> Result<FetchPhase> {
        if self.cancel.is_cancelled() {
            return Ok(FetchPhase::Cancelled);
        }
        if job.state == JobState::Pending {
            self.ledger
                .advance(&job.job_id, JobState::InProgress, None)
                .await?;
        }

        match self.escalator.escalate(&job.url, &self.cancel).await {
            EscalationResult::Succeeded {
                mut attempts,
                payload,
                ..
            } => {
                let key = raw_key(&job.job_id);
                // A crash between put and advance leaves the artifact
                // behind; resume tolerates it
                if !self.store.exists(&key).await? {
                    self.store
                        .put(&key, &serde_json::to_vec_pretty(&payload)?)
                        .await?;
                }
                if let Some(last) = attempts.last_mut() {
                    if last.outcome == AttemptOutcome::Success {
                        last.raw_payload_ref = Some(key.clone());
                    }
                }
                for attempt in attempts {
                    self.ledger.record_attempt(&job.job_id, attempt).await?;
                }
                self.ledger
                    .advance(&job.job_id, JobState::Fetched, None)
                    .await?;
                self.ledger
                    .advance(&job.job_id, JobState::Classified, None)
                    .await?;
                Ok(FetchPhase::Fetched {
                    job_id: job.job_id,
                    payload,
                })
            }
            EscalationResult::Exhausted { attempts } => {
                for attempt in attempts {
                    self.ledger.record_attempt(&job.job_id, attempt).await?;
                }
                warn!(url = %job.url, "all strategies exhausted");
                self.ledger
                    .advance(
                        &job.job_id,
                        JobState::Failed,
                        Some(format!("escalation exhausted for: {}", job.url)),
                    )
                    .await?;
                Ok(FetchPhase::Failed)
            }
            EscalationResult::Cancelled { attempts } => {
                // Leave the job non-terminal; resume re-fetches it
                for attempt in attempts {
                    self.ledger.record_attempt(&job.job_id, attempt).await?;
                }
                Ok(FetchPhase::Cancelled)
            }
        }
    }

    /// Structure one site's classified payloads and settle its jobs.
    async fn structure_site(
        &self,
        site_url: &str,
        seed_job_id: &JobId,
        classified: &[JobId],
        payloads: &[RawPayload],
        summary: &mut RunSummary,
    ) -> Result<()> {
        if classified.is_empty() {
            return Ok(());
        }

        match self.engine.structure_site(site_url, payloads).await {
            Ok(record) => {
                let key = structured_key(seed_job_id);
                if !self.store.exists(&key).await? {
                    self.store
                        .put(&key, &serde_json::to_vec_pretty(&record)?)
                        .await?;
                }
                for job_id in classified {
                    self.ledger.set_structured_ref(job_id, &key).await?;
                    self.ledger
                        .advance(job_id, JobState::Structured, None)
                        .await?;
                }
                summary.records_written += 1;
                summary.jobs_structured += classified.len();
                info!(site = %site_url, artifact = %key, "structured record written");
                Ok(())
            }
            Err(crate::error::StructuringError::NoContent) => {
                // Nothing usable (e.g. forms-only run over a site with no
                // forms); jobs stay classified for a later pass
                info!(site = %site_url, "no structurable content");
                Ok(())
            }
            Err(e) => {
                if let Some(raw) = e.raw_response() {
                    let key = structured_failure_key(seed_job_id);
                    if !self.store.exists(&key).await? {
                        self.store.put(&key, raw.as_bytes()).await?;
                    }
                    warn!(site = %site_url, artifact = %key, "raw model response preserved");
                }
                let detail = format!("structuring: {}", e);
                warn!(site = %site_url, error = %e, "structuring failed");
                for job_id in classified {
                    self.ledger
                        .advance(job_id, JobState::Failed, Some(detail.clone()))
                        .await?;
                }
                summary.jobs_failed += classified.len();
                Ok(())
            }
        }
    }

    /// Read a resumed job's payload back from the artifact store.
    async fn load_payload(&self, job: &JobRecord) -> Result<Option<RawPayload>> {
        let Some(key) = job.raw_payload_ref.as_deref() else {
            return Ok(None);
        };
        let Some(bytes) = self.store.get(key).await? else {
            warn!(job_id = %job.job_id, key = %key, "payload artifact missing");
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}
