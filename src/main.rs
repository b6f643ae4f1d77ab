use std::path::PathBuf;

mod ai;
mod config;
mod db;
mod error;
mod feed;
#[cfg(test)]
mod mocks;
mod models;
mod pipeline;
mod services;

use ai::ComprehendAnalyzer;
use config::Config;
use db::Repository;
use error::Result;
use feed::HttpFetcher;
use pipeline::Pipeline;

const USAGE: &str = "Usage: news-sentiment [--config <path>]";

#[tokio::main]
async fn main() -> Result<()> {
    // Batch runs log to stdout; RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stdout)
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(());
    }

    let config_path = match args.get(1).map(String::as_str) {
        None => None,
        Some("--config") => match args.get(2) {
            Some(path) => Some(PathBuf::from(path)),
            None => return Err(anyhow::anyhow!("--config needs a path\n{USAGE}").into()),
        },
        Some(other) => {
            return Err(anyhow::anyhow!("unknown argument {other:?}\n{USAGE}").into())
        }
    };

    // Load configuration
    let config = Config::load(config_path.as_deref())?;

    // Build the run's dependencies once and hand them to the pipeline
    let repository = Repository::new(&config.database.path).await?;
    tracing::info!("Connection to the database established: {}", config.database.path);

    let fetcher = HttpFetcher::new(&config.http)?;

    let analyzer = ComprehendAnalyzer::new(&config.aws).await;
    tracing::info!("Comprehend client ready in {}", config.aws.region);

    let pipeline = Pipeline::new(repository, fetcher, analyzer, config.pipeline.clone());
    let summary = pipeline.run().await?;

    tracing::info!(
        feeds = summary.feeds_inserted,
        items = summary.items_inserted,
        results = summary.results_inserted,
        skipped = summary.articles_skipped,
        sentiment_failures = summary.sentiment_failures,
        item_errors = summary.item_errors,
        "Run complete"
    );

    Ok(())
}
