//! Command-line runner for the municipal website harvester.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester::strategies::RemoteRenderStrategy;
use harvester::traits::fetch::FetchStrategy;
use harvester::{FileLedger, FirecrawlClient, FsStore, OpenAiModel, Orchestrator, RunConfig};

#[derive(Parser)]
#[command(name = "harvest", about = "Acquire and structure municipal government websites")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest target sites end to end
    Run(RunArgs),

    /// Reattach to an external crawl job by its service token and finish
    /// the pipeline over its pages
    Resume {
        /// Job token issued by the rendering service
        token: String,

        /// Root directory for the ledger and artifacts
        #[arg(long, default_value = "harvest_output")]
        output: PathBuf,
    },

    /// Harvest with structuring restricted to forms and signup content
    Forms(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Seed URLs, one per target site
    #[arg(required = true)]
    targets: Vec<String>,

    /// Maximum link-following depth within each target's domain
    #[arg(long, default_value_t = 2)]
    depth: usize,

    /// Per-fetch-attempt timeout in seconds
    #[arg(long, default_value_t = 45)]
    timeout_secs: u64,

    /// Retry budget for retriable failures within one strategy
    #[arg(long, default_value_t = 3)]
    retries: usize,

    /// Number of concurrent fetch workers
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Root directory for the ledger and artifacts
    #[arg(long, default_value = "harvest_output")]
    output: PathBuf,
}

impl RunArgs {
    fn into_config(self, forms_only: bool) -> RunConfig {
        let mut config = RunConfig::new(self.targets)
            .with_max_depth(self.depth)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_retry_attempts(self.retries)
            .with_concurrency(self.concurrency)
            .with_output_dir(self.output);
        if forms_only {
            config = config.forms_only();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,harvester=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args.into_config(false)).await,
        Command::Forms(args) => run(args.into_config(true)).await,
        Command::Resume { token, output } => resume(token, output).await,
    }
}

async fn run(config: RunConfig) -> Result<()> {
    let orchestrator = build_orchestrator(config).await?;
    install_ctrl_c(&orchestrator);

    let summary = orchestrator.run().await.context("harvest run failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn resume(token: String, output: PathBuf) -> Result<()> {
    let config = RunConfig::default().with_output_dir(output);
    let orchestrator = build_orchestrator(config).await?;
    install_ctrl_c(&orchestrator);

    let client = FirecrawlClient::from_env().context("render service credentials missing")?;
    let summary = orchestrator
        .resume_external(&client, &token)
        .await
        .context("external job resume failed")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn build_orchestrator(config: RunConfig) -> Result<Orchestrator<OpenAiModel>> {
    let ledger = Arc::new(
        FileLedger::open(config.output_dir.join("ledger.jsonl"))
            .context("failed to open job ledger")?,
    );
    let store = Arc::new(
        FsStore::new(config.output_dir.join("artifacts"))
            .context("failed to open artifact store")?,
    );

    let render = FirecrawlClient::from_env().context("render service credentials missing")?;
    #[allow(unused_mut)]
    let mut strategies: Vec<Arc<dyn FetchStrategy>> =
        vec![Arc::new(RemoteRenderStrategy::new(render))];

    #[cfg(feature = "browser")]
    {
        let backend = harvester::ChromiumBackend::launch()
            .await
            .context("failed to launch browser backend")?;
        strategies.push(Arc::new(harvester::BrowserStrategy::new(backend)));
    }

    #[cfg(feature = "pdf")]
    {
        strategies.push(Arc::new(harvester::DocumentStrategy::new(Arc::new(
            harvester::PdfTextExtractor::new(),
        ))));
    }

    let model = OpenAiModel::from_env().context("model credentials missing")?;
    Ok(Orchestrator::new(config, ledger, store, strategies, model))
}

fn install_ctrl_c<M: harvester::StructuringModel>(orchestrator: &Orchestrator<M>) {
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, finishing in-flight writes");
            token.cancel();
        }
    });
}
