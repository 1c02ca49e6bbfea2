//! VEGA command line
//!
//! Classifies satellite image patches and whole scenes, printing JSON on
//! stdout. Logs go to stderr and follow `RUST_LOG` (default `info`).
//!
//! Usage:
//!   vega predict patch.png
//!   vega predict-batch a.png b.png c.png
//!   vega analyze scene.tif --patch-size 32 --probabilities
//!
//! The checkpoint manifest defaults to `./models/checkpoint.json`; override
//! it with `--checkpoint` or `VEGA_CHECKPOINT`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use vega_preprocess::Source;
use vega_scan::{Engine, EngineConfig, EngineError, ErrorKind, ErrorReport, ScanOptions};

#[derive(Parser)]
#[command(name = "vega", version, about = "Land-cover classification of satellite imagery")]
struct CliArgs {
    /// JSON engine config; missing fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Checkpoint manifest, overrides config and environment
    #[arg(long, global = true)]
    checkpoint: Option<PathBuf>,

    #[arg(long, global = true)]
    max_concurrent_scans: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Classify a single patch
    Predict { file: PathBuf },
    /// Classify several patches independently and tally the labels
    PredictBatch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Tile an image into patches and classify each one
    Analyze {
        file: PathBuf,
        /// Patch side in pixels (defaults to the configured size)
        #[arg(long)]
        patch_size: Option<u32>,
        /// Include every patch's class distribution
        #[arg(long)]
        probabilities: bool,
    },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(checkpoint) = &args.checkpoint {
        config.model.checkpoint_path = checkpoint.clone();
    }
    if let Some(n) = args.max_concurrent_scans {
        config.scan.max_concurrent_scans = n;
    }
    Ok(config)
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize output")
}

async fn execute(args: CliArgs) -> Result<String> {
    let config = load_config(&args)?;
    let engine = Engine::new(config);

    match args.command {
        Command::Predict { file } => {
            let prediction = engine.predict_patch(Source::from(file)).await?;
            to_json(&prediction)
        }
        Command::PredictBatch { files } => {
            let sources = files.into_iter().map(Source::from).collect();
            let batch = engine.predict_batch(sources).await?;
            to_json(&batch)
        }
        Command::Analyze {
            file,
            patch_size,
            probabilities,
        } => {
            let patch_size = patch_size.unwrap_or_else(|| engine.default_patch_size());
            let options = ScanOptions {
                with_probabilities: probabilities,
            };
            let report = engine.analyze_source(Source::from(file), patch_size, options).await?;
            for summary in report.class_summary() {
                info!(
                    label = %summary.label,
                    patches = summary.patches,
                    pixels = summary.pixels,
                    "class coverage"
                );
            }
            to_json(&report)
        }
    }
}

/// Engine failures keep their kind; anything else (bad flags, unreadable
/// config) is reported as an invalid argument.
fn report_for(err: &anyhow::Error) -> ErrorReport {
    match err.downcast_ref::<EngineError>() {
        Some(engine_err) => engine_err.to_report(),
        None => ErrorReport {
            kind: ErrorKind::InvalidArgument,
            message: format!("{err:#}"),
        },
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = CliArgs::parse();

    match execute(args).await {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let report = report_for(&err);
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("{}: {}", err, err.root_cause()),
            }
            ExitCode::FAILURE
        }
    }
}
