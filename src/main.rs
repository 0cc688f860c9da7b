//! Stacking Forecast Ensemble
//!
//! Walk-forward validation and production forecasts from flat CSV inputs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use stacking_forecast::{
    config::{Config, DataConfig},
    data::DataLoader,
    export,
    pipeline::ForecastPipeline,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stacking-forecast")]
#[command(about = "Multi-horizon stacking ensemble with walk-forward validation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run walk-forward validation and write the metrics table
    Validate {
        /// Also print per-horizon summaries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate, train production ensembles and write both tables
    Run,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).with_context(|| format!("Failed to load config from {}", cli.config))?;

    match cli.command {
        Commands::Validate { json } => validate(config, json),
        Commands::Run => run(config),
    }
}

fn validate(config: Config, json: bool) -> anyhow::Result<()> {
    let data = DataLoader::load(&config).context("Failed to load dataset")?;
    let pipeline = ForecastPipeline::new(config);

    let report = pipeline.validate(&data)?;
    export::write_metrics_file(DataConfig::resolve(&pipeline.config().data.metrics_path), &report.records)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report.summaries)?);
    }
    let failed = report.failed().count();
    if failed > 0 {
        tracing::warn!("{} of {} folds failed", failed, report.records.len());
    }
    Ok(())
}

fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting stacking forecast run");
    let data = DataLoader::load(&config).context("Failed to load dataset")?;
    let pipeline = ForecastPipeline::new(config);

    let output = pipeline.run(&data)?;
    let paths = &pipeline.config().data;
    export::write_metrics_file(DataConfig::resolve(&paths.metrics_path), &output.report.records)?;
    output
        .predictions
        .write_file(DataConfig::resolve(&paths.predictions_path))?;

    tracing::info!("Run complete");
    Ok(())
}
