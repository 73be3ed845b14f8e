use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use appfab::agents::{
    ClassifierAgent, KeywordClassifier, ScriptedBilling, ScriptedCoder, ScriptedDeployer,
    ScriptedPlanner,
};
use appfab::blueprint;
use appfab::config::PlatformConfig;
use appfab::emit::FileEmitter;
use appfab::models::{JobData, MinimalSpec};
use appfab::pipeline::PipelineRunner;
use appfab::progress::ProgressStore;
use appfab::queue::JobQueue;
use appfab::service::{GenerationService, Session};
use appfab::worker::WorkerPool;

#[derive(Parser)]
#[command(name = "appfab")]
#[command(version, about = "Multi-tenant application generator")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "appfab.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a free-text app description without running a generation
    Classify {
        /// What the application should do
        description: String,
    },
    /// List the available application blueprints
    Blueprints,
    /// Generate an application from a free-text description
    Run {
        /// What the application should do
        description: String,

        /// Display name for the generated application
        #[arg(long, default_value = "Untitled App")]
        app_name: String,

        /// Owning organization id
        #[arg(long, default_value = "org_local")]
        org: String,

        /// Override the configured worker pool size
        #[arg(long)]
        pool_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appfab=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PlatformConfig::load(&cli.config)?;

    match cli.command {
        Commands::Classify { description } => cmd_classify(&description).await,
        Commands::Blueprints => cmd_blueprints(),
        Commands::Run {
            description,
            app_name,
            org,
            pool_size,
        } => cmd_run(&config, &description, &app_name, &org, pool_size).await,
    }
}

async fn cmd_classify(description: &str) -> Result<()> {
    let classification = KeywordClassifier.classify(description).await?.value;
    println!("{}", serde_json::to_string_pretty(&classification)?);
    Ok(())
}

fn cmd_blueprints() -> Result<()> {
    for bp in blueprint::catalog() {
        println!("{:<12} {:<24} [{}]", bp.id, bp.name, bp.industry);
        println!("             {}", bp.description);
    }
    Ok(())
}

async fn cmd_run(
    config: &PlatformConfig,
    description: &str,
    app_name: &str,
    org: &str,
    pool_size: Option<usize>,
) -> Result<()> {
    let classification = KeywordClassifier.classify(description).await?.value;
    info!(
        blueprint = %classification.suggested_blueprint,
        industry = %classification.industry,
        confidence = classification.confidence,
        "description classified"
    );

    let job = JobData {
        generation_id: format!("gen_{}", Uuid::new_v4().simple()),
        app_id: format!("app_{}", Uuid::new_v4().simple()),
        org_id: org.to_string(),
        mvs: MinimalSpec::new(description),
        blueprint_id: classification.suggested_blueprint.clone(),
        industry_overlay: classification.suggested_overlay.clone(),
    };
    let generation_id = job.generation_id.clone();

    let queue = JobQueue::new(config.retention.policy());
    let progress = Arc::new(ProgressStore::new());
    let runner = Arc::new(PipelineRunner::new(
        Arc::new(ScriptedPlanner),
        Arc::new(ScriptedCoder),
        Arc::new(ScriptedDeployer),
        Arc::new(ScriptedBilling),
        FileEmitter::new(&config.pipeline.output_root),
        Arc::clone(&progress),
    ));
    let service = GenerationService::new(Arc::clone(&queue), Arc::clone(&progress));

    service.submit(job, app_name).await?;
    let size = pool_size.unwrap_or(config.pipeline.pool_size);
    let pool = WorkerPool::start(size, Arc::clone(&queue), runner);

    let session = Session::new(org);
    let status = loop {
        let status = service
            .status(Some(&session), &generation_id)
            .context("generation vanished from the progress store")?;
        if status.status.is_terminal() {
            break status;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    };

    pool.shutdown(&queue).await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    if status.error.is_some() {
        std::process::exit(1);
    }
    Ok(())
}
