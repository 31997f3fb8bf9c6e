//! Per-URL strategy escalation.
//!
//! Strategies are tried strictly in escalation order, never concurrently,
//! because a successful cheap strategy must short-circuit the expensive
//! ones. A strategy's success only counts when the classifier confirms
//! the payload is complete enough for its detected kind; otherwise the
//! escalator advances as if the strategy had failed.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::{classify, Classification};
use crate::traits::fetch::{FetchStrategy, FetchedContent};
use crate::types::job::{AttemptOutcome, FetchAttempt, StrategyKind};
use crate::types::payload::{FormInfo, RawPayload};

/// Result of escalating one URL through the strategy chain.
#[derive(Debug)]
pub enum EscalationResult {
    /// A strategy produced a payload the classifier accepted
    Succeeded {
        attempts: Vec<FetchAttempt>,
        payload: RawPayload,
        classification: Classification,
    },
    /// All applicable strategies failed
    Exhausted { attempts: Vec<FetchAttempt> },
    /// Run-level cancellation observed between attempts
    Cancelled { attempts: Vec<FetchAttempt> },
}

/// Tries strategies in priority order and accumulates the final payload.
pub struct Escalator {
    strategies: Vec<Arc<dyn FetchStrategy>>,
    timeout: Duration,
    /// Total tries allowed per strategy for retriable failures
    retry_attempts: usize,
    backoff_base: Duration,
}

impl Escalator {
    /// Create an escalator over strategies already in escalation order.
    pub fn new(strategies: Vec<Arc<dyn FetchStrategy>>) -> Self {
        Self {
            strategies,
            timeout: Duration::from_secs(45),
            retry_attempts: 3,
            backoff_base: Duration::from_millis(1_000),
        }
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the per-strategy try budget (minimum 1).
    pub fn with_retry_attempts(mut self, attempts: usize) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    /// Set the exponential-backoff base delay.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Drive one URL through the strategy chain.
    pub async fn escalate(&self, url: &str, cancel: &CancellationToken) -> EscalationResult {
        let mut attempts: Vec<FetchAttempt> = Vec::new();

        for strategy in &self.strategies {
            if !strategy.supports(url) {
                debug!(url = %url, strategy = %strategy.kind(), "strategy not applicable, skipping");
                continue;
            }

            debug!(url = %url, strategy = %strategy.kind(), "trying strategy");

            match self.try_strategy(url, strategy.as_ref(), cancel, &mut attempts).await {
                StrategyVerdict::Accepted(payload, classification) => {
                    info!(
                        url = %url,
                        strategy = %strategy.kind(),
                        kinds = ?classification.kinds,
                        "escalation succeeded"
                    );
                    return EscalationResult::Succeeded {
                        attempts,
                        payload,
                        classification,
                    };
                }
                StrategyVerdict::Escalate => continue,
                StrategyVerdict::Cancelled => {
                    return EscalationResult::Cancelled { attempts };
                }
            }
        }

        warn!(url = %url, attempts = attempts.len(), "escalation exhausted");
        EscalationResult::Exhausted { attempts }
    }

    /// Run one strategy with bounded retries. Records exactly one
    /// `FetchAttempt` for the (url, strategy) pair.
    async fn try_strategy(
        &self,
        url: &str,
        strategy: &dyn FetchStrategy,
        cancel: &CancellationToken,
        attempts: &mut Vec<FetchAttempt>,
    ) -> StrategyVerdict {
        let started_at = chrono::Utc::now();
        let mut tries = 0;

        loop {
            if cancel.is_cancelled() {
                return StrategyVerdict::Cancelled;
            }

            tries += 1;
            let outcome = strategy.attempt(url, self.timeout).await;

            if outcome.is_success() {
                let content = outcome.raw_content.unwrap_or_default();
                let classification = classify(&content);

                match completeness(&content, &classification) {
                    Ok(()) => {
                        let payload = build_payload(url, content, strategy.kind(), &classification);
                        attempts.push(FetchAttempt {
                            url: url.to_string(),
                            strategy: strategy.kind(),
                            started_at,
                            outcome: AttemptOutcome::Success,
                            raw_payload_ref: None, // set by the orchestrator once stored
                            error_detail: None,
                        });
                        return StrategyVerdict::Accepted(payload, classification);
                    }
                    Err(reason) => {
                        // Nominal success, but not complete enough for its
                        // detected kind: escalate anyway
                        debug!(url = %url, strategy = %strategy.kind(), reason = %reason, "payload incomplete");
                        attempts.push(FetchAttempt::failure(
                            url,
                            strategy.kind(),
                            started_at,
                            AttemptOutcome::SoftFail,
                            format!("incomplete payload: {}", reason),
                        ));
                        return StrategyVerdict::Escalate;
                    }
                }
            }

            let detail = outcome
                .error_detail
                .unwrap_or_else(|| "unspecified failure".to_string());

            if outcome.status == AttemptOutcome::SoftFail
                && outcome.retriable
                && tries < self.retry_attempts
            {
                let delay = self.backoff_base * 2u32.saturating_pow(tries as u32 - 1);
                debug!(
                    url = %url,
                    strategy = %strategy.kind(),
                    tries = tries,
                    delay_ms = delay.as_millis() as u64,
                    "retriable failure, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return StrategyVerdict::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }

            attempts.push(FetchAttempt::failure(
                url,
                strategy.kind(),
                started_at,
                outcome.status,
                format!("{} (after {} tries)", detail, tries),
            ));
            return StrategyVerdict::Escalate;
        }
    }
}

enum StrategyVerdict {
    Accepted(RawPayload, Classification),
    Escalate,
    Cancelled,
}

/// Completeness check for a nominally successful fetch.
///
/// Ambiguous classification forces escalation; correctness of
/// downstream structuring outranks saving one fetch. Form-bearing
/// payloads must expose field lists, not just a login wall.
fn completeness(
    content: &FetchedContent,
    classification: &Classification,
) -> Result<(), String> {
    if classification.is_ambiguous() {
        return Err("ambiguous classification".to_string());
    }
    if classification.has_kind(crate::types::payload::ContentKind::FormBearing)
        && !content.forms.iter().any(FormInfo::has_named_fields)
    {
        return Err("form-bearing page without extracted field names".to_string());
    }
    Ok(())
}

fn build_payload(
    url: &str,
    content: FetchedContent,
    strategy: StrategyKind,
    classification: &Classification,
) -> RawPayload {
    let mut payload = RawPayload::new(url, content.text, strategy)
        .with_forms(content.forms)
        .with_links(content.links);
    if let Some(ct) = content.content_type {
        payload = payload.with_content_type(ct);
    }
    payload.kinds = classification.kinds.clone();
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockStrategy;
    use crate::traits::fetch::FetchOutcome;
    use crate::types::payload::ContentKind;

    fn page_content(text: &str) -> FetchedContent {
        FetchedContent {
            text: text.to_string(),
            html: Some(format!("<html><body><p>{}</p></body></html>", text)),
            ..Default::default()
        }
    }

    const LONG_TEXT: &str = "City Council meets every third Thursday at 7pm in the council \
        chambers at 100 Main Street. Agendas are posted the preceding Friday and public \
        comment is taken at the start of each session.";

    fn fast() -> (CancellationToken, Duration) {
        (CancellationToken::new(), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_first_strategy_success_short_circuits() {
        let s1 = Arc::new(
            MockStrategy::new(StrategyKind::RemoteRender)
                .with_outcome(FetchOutcome::success(page_content(LONG_TEXT))),
        );
        let s2 = Arc::new(MockStrategy::new(StrategyKind::BrowserAutomation));

        let escalator = Escalator::new(vec![s1, s2.clone()]);
        let (cancel, _) = fast();

        match escalator.escalate("https://example-city.gov/", &cancel).await {
            EscalationResult::Succeeded {
                attempts, payload, ..
            } => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].strategy, StrategyKind::RemoteRender);
                assert!(payload.is_kind(ContentKind::Plain));
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(s2.call_count(), 0);
    }

    #[tokio::test]
    async fn test_hard_fail_advances_with_one_attempt_recorded() {
        let s1 = Arc::new(
            MockStrategy::new(StrategyKind::RemoteRender)
                .with_outcome(FetchOutcome::hard_fail("404")),
        );
        let s2 = Arc::new(
            MockStrategy::new(StrategyKind::BrowserAutomation)
                .with_outcome(FetchOutcome::success(page_content(LONG_TEXT))),
        );

        let escalator = Escalator::new(vec![s1.clone(), s2]);
        let (cancel, _) = fast();

        match escalator.escalate("https://example-city.gov/", &cancel).await {
            EscalationResult::Succeeded { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[0].strategy, StrategyKind::RemoteRender);
                assert_eq!(attempts[0].outcome, AttemptOutcome::HardFail);
                assert_eq!(attempts[1].strategy, StrategyKind::BrowserAutomation);
                assert_eq!(attempts[1].outcome, AttemptOutcome::Success);
            }
            other => panic!("expected success, got {:?}", other),
        }
        assert_eq!(s1.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retriable_failure_retries_up_to_budget() {
        let s1 = Arc::new(
            MockStrategy::new(StrategyKind::RemoteRender)
                .with_outcome(FetchOutcome::soft_fail("rate limited", true)),
        );

        let escalator = Escalator::new(vec![s1.clone()])
            .with_retry_attempts(3)
            .with_backoff_base(Duration::from_millis(1));
        let (cancel, _) = fast();

        match escalator.escalate("https://example-city.gov/", &cancel).await {
            EscalationResult::Exhausted { attempts } => {
                // Three tries collapse into one recorded attempt
                assert_eq!(attempts.len(), 1);
                assert!(attempts[0]
                    .error_detail
                    .as_deref()
                    .unwrap()
                    .contains("3 tries"));
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert_eq!(s1.call_count(), 3);
    }

    #[tokio::test]
    async fn test_incomplete_form_payload_escalates() {
        // Remote render sees form markup but extracts no field names
        let gated = FetchedContent {
            text: "Sign in to view service request forms for residents of the city.".into(),
            html: Some("<form action=\"/login\"></form>".into()),
            ..Default::default()
        };
        let s1 = Arc::new(
            MockStrategy::new(StrategyKind::RemoteRender)
                .with_outcome(FetchOutcome::success(gated)),
        );

        let rendered = FetchedContent {
            text: LONG_TEXT.into(),
            html: Some(r#"<form id="req"><input name="address" type="text"></form>"#.into()),
            forms: crate::html::parse_forms(
                r#"<form id="req"><input name="address" type="text"></form>"#,
            ),
            ..Default::default()
        };
        let s2 = Arc::new(
            MockStrategy::new(StrategyKind::BrowserAutomation)
                .with_outcome(FetchOutcome::success(rendered)),
        );

        let escalator = Escalator::new(vec![s1, s2]);
        let (cancel, _) = fast();

        match escalator.escalate("https://example-city.gov/requests", &cancel).await {
            EscalationResult::Succeeded { attempts, payload, .. } => {
                assert_eq!(attempts[0].outcome, AttemptOutcome::SoftFail);
                assert!(attempts[0]
                    .error_detail
                    .as_deref()
                    .unwrap()
                    .contains("incomplete"));
                assert!(payload.forms[0].has_named_fields());
            }
            other => panic!("expected success via escalation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unsupported_strategy_records_no_attempt() {
        let doc_only = Arc::new(
            MockStrategy::new(StrategyKind::DocumentExtraction)
                .supporting_only_documents()
                .with_outcome(FetchOutcome::hard_fail("unused")),
        );

        let escalator = Escalator::new(vec![doc_only.clone()]);
        let (cancel, _) = fast();

        match escalator.escalate("https://example-city.gov/page", &cancel).await {
            EscalationResult::Exhausted { attempts } => assert!(attempts.is_empty()),
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert_eq!(doc_only.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_attempt() {
        let s1 = Arc::new(
            MockStrategy::new(StrategyKind::RemoteRender)
                .with_outcome(FetchOutcome::hard_fail("down")),
        );
        let escalator = Escalator::new(vec![s1]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        match escalator.escalate("https://example-city.gov/", &cancel).await {
            EscalationResult::Cancelled { attempts } => assert!(attempts.is_empty()),
            other => panic!("expected cancelled, got {:?}", other),
        }
    }
}
