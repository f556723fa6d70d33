use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use igreports_common::Config;
use igreports_store::ReportStore;

use igreports_pipeline::bluesky::BlueskyPublisher;
use igreports_pipeline::collaborators::{LlmClassifier, LlmSummarizer};
use igreports_pipeline::feed_source::FeedReportSource;
use igreports_pipeline::run::{run, PipelineOptions, RunContext};

/// Daily oversight-report pipeline: ingest, prefilter, classify,
/// summarize, publish.
#[derive(Parser, Debug)]
#[command(name = "igreports", version)]
struct Cli {
    /// Log decisions without writing to the store or publishing.
    #[arg(long)]
    dry_run: bool,

    /// Lookback window for the report source, in days.
    #[arg(long, default_value_t = 1)]
    days_back: u32,

    /// Max reports sent to the classifier this run.
    #[arg(long, default_value_t = 100)]
    classify_limit: u32,

    #[arg(long)]
    skip_ingest: bool,

    #[arg(long)]
    skip_prefilter: bool,

    #[arg(long)]
    skip_classify: bool,

    #[arg(long)]
    skip_summarize: bool,

    #[arg(long)]
    skip_publish: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    config.log_redacted();

    let store = ReportStore::connect(&config.database_url).await?;

    let source = Arc::new(FeedReportSource::new(&config.feed_url));
    let classifier = Arc::new(LlmClassifier::new(&config));
    let summarizer = Arc::new(LlmSummarizer::new(&config));
    let publisher = Arc::new(BlueskyPublisher::new(&config));

    let ctx = RunContext::new(
        config,
        store.clone(),
        source,
        classifier,
        summarizer,
        publisher,
        cli.dry_run,
    );

    let opts = PipelineOptions {
        days_back: cli.days_back,
        classify_limit: cli.classify_limit,
        skip_ingest: cli.skip_ingest,
        skip_prefilter: cli.skip_prefilter,
        skip_classify: cli.skip_classify,
        skip_summarize: cli.skip_summarize,
        skip_publish: cli.skip_publish,
    };

    let stats = run(&ctx, &opts).await;
    println!("{stats}");

    for (state, count) in store.counts_by_state().await? {
        info!(state = %state, count, "State total");
    }
    let total_spent = store.total_cost_cents().await?;
    info!(total_cost_cents = total_spent, "Lifetime spend");

    if stats.failures() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
