//! End-to-end pipeline tests over scripted backends.
//!
//! Exercises the full escalation, ledger, and structuring path with a
//! durable file ledger, the way a real run would, but with every external
//! boundary mocked.

use std::sync::Arc;

use harvester::ledger::FileLedger;
use harvester::stores::FsStore;
use harvester::strategies::{BrowserStrategy, RemoteRenderStrategy};
use harvester::testing::{MockBrowserBackend, MockModel, MockRenderClient, MockStrategy};
use harvester::traits::browser::RenderedPage;
use harvester::traits::fetch::{FetchOutcome, FetchStrategy, FetchedContent};
use harvester::traits::ledger::JobLedger;
use harvester::traits::render::RenderResponse;
use harvester::traits::store::ArtifactStore;
use harvester::types::job::{AttemptOutcome, JobState, StrategyKind};
use harvester::{Orchestrator, RunConfig};

const SEED: &str = "https://example-city.gov/";
const SIGNUP_URL: &str = "https://example-city.gov/signup";
const BUDGET_URL: &str = "https://example-city.gov/budget.pdf";

const SEED_HTML: &str = r#"
<html><head><title>Example City</title></head>
<body>
<h1>Welcome to Example City</h1>
<p>City Hall is open Monday through Friday from eight to five. The Public Works
Department maintains streets, parks, and the municipal water system. Council
meetings are held every third Thursday at 7pm in the council chambers.</p>
<a href="/signup">Resident alerts signup</a>
<a href="/budget.pdf">Adopted budget</a>
</body></html>
"#;

const SIGNUP_HTML: &str = r#"
<html><body>
<h2>Sign up for resident alerts</h2>
<p>Register to receive snow emergency and water outage notifications.</p>
<form id="alerts" action="/subscribe" method="post">
  <label for="email">Email address</label>
  <input type="email" name="email" id="email" required>
  <input type="text" name="zip" placeholder="ZIP code">
</form>
</body></html>
"#;

fn structured_json(signup_available: bool) -> String {
    serde_json::json!({
        "overview": "Official website of Example City",
        "city_name": "Example City",
        "departments": ["Public Works"],
        "services": ["Snow removal", "Water"],
        "contacts": [],
        "meetings": [{"title": "City Council", "date": "", "time": "7pm", "location": "council chambers", "agenda": ""}],
        "documents": [{"title": "Adopted budget", "type": "budget", "url": BUDGET_URL, "description": ""}],
        "news": [],
        "forms": [{"name": "Resident alerts", "type": "signup", "purpose": "notifications", "url": SIGNUP_URL, "fields": ["email", "zip"], "requirements": []}],
        "signup_info": {"available": signup_available, "description": "Resident alert signup", "requirements": [], "benefits": []}
    })
    .to_string()
}

/// Strategies scripted for the three-page site: the signup page needs
/// browser escalation and the budget PDF falls through to document
/// extraction.
fn scripted_strategies() -> Vec<Arc<dyn FetchStrategy>> {
    let render = MockRenderClient::new()
        .with_render(
            SEED,
            Ok(RenderResponse {
                status: 200,
                body: SEED_HTML.to_string(),
                rendered: true,
            }),
        )
        // JS-gated: near-empty body forces escalation
        .with_render(
            SIGNUP_URL,
            Ok(RenderResponse {
                status: 200,
                body: "<div id=\"app\"></div>".to_string(),
                rendered: false,
            }),
        )
        .with_render(
            BUDGET_URL,
            Ok(RenderResponse {
                status: 415,
                body: String::new(),
                rendered: false,
            }),
        );

    let browser = MockBrowserBackend::new().with_page(
        SIGNUP_URL,
        Ok(RenderedPage {
            dom_text: "Sign up for resident alerts. Register to receive snow emergency \
                       and water outage notifications from the city."
                .to_string(),
            html: SIGNUP_HTML.to_string(),
            title: Some("Resident alerts".to_string()),
            forms: vec![],
        }),
    );

    let document = MockStrategy::new(StrategyKind::DocumentExtraction)
        .supporting_only_documents()
        .with_outcome(FetchOutcome::success(FetchedContent {
            text: "Adopted budget for fiscal year 2025. General fund revenues total \
                   twelve million dollars, with public safety the largest expenditure."
                .to_string(),
            bytes: Some(b"%PDF-1.7 budget".to_vec()),
            content_type: Some("application/pdf".to_string()),
            ..Default::default()
        }));

    vec![
        Arc::new(RemoteRenderStrategy::new(render)),
        Arc::new(BrowserStrategy::new(browser)),
        Arc::new(document),
    ]
}

fn config(dir: &std::path::Path) -> RunConfig {
    RunConfig::new([SEED])
        .with_max_depth(1)
        .with_retry_attempts(1)
        .with_backoff_base_ms(1)
        .with_concurrency(2)
        .with_output_dir(dir)
}

#[tokio::test]
async fn full_pipeline_structures_a_three_page_site() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(FileLedger::open(dir.path().join("ledger.jsonl")).unwrap());
    let store = Arc::new(FsStore::new(dir.path().join("artifacts")).unwrap());

    // Model denies signup availability; classification must override it
    let model = MockModel::new().with_response(Ok(structured_json(false)));
    let orch = Orchestrator::new(
        config(dir.path()),
        ledger.clone(),
        store.clone(),
        scripted_strategies(),
        model,
    );

    let summary = orch.run().await.unwrap();
    assert_eq!(summary.sites, 1);
    assert_eq!(summary.jobs_total, 3);
    assert_eq!(summary.jobs_structured, 3);
    assert_eq!(summary.jobs_failed, 0);
    assert_eq!(summary.records_written, 1);

    let jobs = ledger.load_all().await.unwrap();
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.state == JobState::Structured));

    // The signup page carries one soft-fail then one browser success
    let signup = jobs.iter().find(|j| j.url == SIGNUP_URL).unwrap();
    assert_eq!(signup.attempts.len(), 2);
    assert_eq!(signup.attempts[0].strategy, StrategyKind::RemoteRender);
    assert_eq!(signup.attempts[0].outcome, AttemptOutcome::SoftFail);
    assert_eq!(signup.attempts[1].strategy, StrategyKind::BrowserAutomation);
    assert_eq!(signup.attempts[1].outcome, AttemptOutcome::Success);

    // The budget PDF went through all three slots
    let budget = jobs.iter().find(|j| j.url == BUDGET_URL).unwrap();
    assert_eq!(
        budget.attempts.last().unwrap().strategy,
        StrategyKind::DocumentExtraction
    );

    // One structured artifact, keyed by the seed job, with the forced
    // signup availability
    let seed_job = jobs.iter().find(|j| j.url == SEED).unwrap();
    let key = seed_job.structured_ref.as_deref().unwrap();
    assert_eq!(key, &harvester::structured_key(&seed_job.job_id));
    let bytes = store.get(key).await.unwrap().unwrap();
    let record: harvester::StructuredRecord = serde_json::from_slice(&bytes).unwrap();
    assert!(record.signup_info.available);
    assert_eq!(record.forms.len(), 1);
}

#[tokio::test]
async fn resume_completes_a_run_killed_mid_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.jsonl");
    let store = Arc::new(FsStore::new(dir.path().join("artifacts")).unwrap());

    // Simulate a prior run that created the seed job, marked it
    // in-progress, and died before any attempt landed
    {
        let ledger = FileLedger::open(&ledger_path).unwrap();
        let job = ledger.create(SEED, SEED).await.unwrap();
        ledger
            .advance(&job.job_id, JobState::InProgress, None)
            .await
            .unwrap();
    }

    let ledger = Arc::new(FileLedger::open(&ledger_path).unwrap());
    let model = MockModel::new().with_response(Ok(structured_json(false)));
    let orch = Orchestrator::new(
        config(dir.path()),
        ledger.clone(),
        store,
        scripted_strategies(),
        model,
    );

    let summary = orch.run().await.unwrap();

    // The in-progress job was re-fetched, not duplicated, and the whole
    // site completed
    assert_eq!(summary.jobs_structured, 3);
    let jobs = ledger.load_all().await.unwrap();
    assert_eq!(jobs.iter().filter(|j| j.url == SEED).count(), 1);
    assert!(jobs.iter().all(|j| j.state == JobState::Structured));

    // Replaying the ledger reproduces the final state
    drop(orch);
    let replayed = FileLedger::open(&ledger_path).unwrap();
    let jobs = replayed.load_all().await.unwrap();
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.state == JobState::Structured));
}

#[tokio::test]
async fn rerun_after_success_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.jsonl");
    let store = Arc::new(FsStore::new(dir.path().join("artifacts")).unwrap());

    {
        let ledger = Arc::new(FileLedger::open(&ledger_path).unwrap());
        let model = MockModel::new().with_response(Ok(structured_json(false)));
        let orch = Orchestrator::new(
            config(dir.path()),
            ledger,
            store.clone(),
            scripted_strategies(),
            model,
        );
        orch.run().await.unwrap();
    }

    // Second run over the same ledger: everything is terminal, so no
    // fetches and no new records
    let ledger = Arc::new(FileLedger::open(&ledger_path).unwrap());
    let model = MockModel::new();
    let orch = Orchestrator::new(
        config(dir.path()),
        ledger.clone(),
        store,
        vec![], // any fetch would exhaust immediately
        model,
    );
    let summary = orch.run().await.unwrap();

    assert_eq!(summary.records_written, 0);
    assert_eq!(summary.jobs_failed, 0);
    assert_eq!(summary.jobs_skipped, 3);
    let jobs = ledger.load_all().await.unwrap();
    assert_eq!(jobs.len(), 3);
    assert!(jobs.iter().all(|j| j.state == JobState::Structured));
}

#[tokio::test]
async fn forms_only_run_leaves_formless_site_classified() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(FileLedger::open(dir.path().join("ledger.jsonl")).unwrap());
    let store = Arc::new(FsStore::new(dir.path().join("artifacts")).unwrap());

    let render = MockRenderClient::new().with_render(
        SEED,
        Ok(RenderResponse {
            status: 200,
            body: "<html><body><p>City Hall is open Monday through Friday from eight \
                   to five for all resident services and permit applications.</p></body></html>"
                .to_string(),
            rendered: true,
        }),
    );
    let strategies: Vec<Arc<dyn FetchStrategy>> =
        vec![Arc::new(RemoteRenderStrategy::new(render))];

    let cfg = config(dir.path()).with_max_depth(0).forms_only();
    let model = MockModel::new();
    let orch = Orchestrator::new(cfg, ledger.clone(), store, strategies, model);

    let summary = orch.run().await.unwrap();
    assert_eq!(summary.records_written, 0);
    assert_eq!(summary.jobs_failed, 0);

    // No forms anywhere: the job stays classified for a later full pass
    let jobs = ledger.load_all().await.unwrap();
    assert_eq!(jobs[0].state, JobState::Classified);
}
