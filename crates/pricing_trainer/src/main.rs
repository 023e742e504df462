//! MHD offline pipeline CLI
//!
//! generate -> prepare -> train -> evaluate, each step reading the previous
//! step's files.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use mhd_pricing_trainer::pipeline::{evaluate_dir, generate_to, prepare_dir, train_dir};
use mhd_pricing_trainer::{GbdtConfig, PrepConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mhd-train")]
#[command(author = "MHD Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline data generation and price-model training for MHD", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a synthetic sales file
    Generate(GenerateArgs),
    /// Engineer features, fit encoders and split into train/test
    Prepare(PrepareArgs),
    /// Train the price model on prepared data
    Train(TrainArgs),
    /// Evaluate a trained model on the test split
    Evaluate(EvaluateArgs),
    /// Run all four steps under one working directory
    Pipeline(PipelineArgs),
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Output CSV path
    #[arg(short, long, default_value = "data/raw/memphis_housing.csv")]
    output: PathBuf,

    #[command(flatten)]
    sampling: SamplingArgs,
}

#[derive(Args, Debug, Clone)]
struct SamplingArgs {
    /// Number of sales to generate
    #[arg(long, default_value = "5000")]
    samples: usize,

    /// Random seed
    #[arg(long = "generate-seed", default_value = "42")]
    seed: u64,

    /// Sale dates are drawn from the two years before this date (default: today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct PrepareArgs {
    /// Raw sales CSV
    #[arg(short, long, default_value = "data/raw/memphis_housing.csv")]
    input: PathBuf,

    /// Output directory for train.csv, test.csv and feature_info.json
    #[arg(short, long, default_value = "data/processed")]
    output: PathBuf,

    #[command(flatten)]
    split: SplitArgs,
}

#[derive(Args, Debug, Clone)]
struct SplitArgs {
    /// Test set fraction
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Seed for the train/test split
    #[arg(long = "split-seed", default_value = "42")]
    seed: u64,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Directory with prepared data
    #[arg(long, default_value = "data/processed")]
    data_dir: PathBuf,

    /// Output directory for the model artifacts
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    #[command(flatten)]
    gbdt: GbdtArgs,
}

#[derive(Args, Debug, Clone)]
struct GbdtArgs {
    /// Number of boosting trees
    #[arg(long, default_value = "200")]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "6")]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value = "3")]
    min_samples_leaf: usize,

    /// Learning rate (fixed-point, e.g., 100000 = 0.1)
    #[arg(long, default_value = "100000")]
    learning_rate: i64,

    /// Quantization step for split thresholds
    #[arg(long, default_value = "1000")]
    quant_step: i64,
}

impl From<GbdtArgs> for GbdtConfig {
    fn from(args: GbdtArgs) -> Self {
        Self {
            num_trees: args.trees,
            max_depth: args.max_depth,
            min_samples_leaf: args.min_samples_leaf,
            learning_rate: args.learning_rate,
            quant_step: args.quant_step,
            ..GbdtConfig::default()
        }
    }
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    #[arg(long, default_value = "models")]
    model_dir: PathBuf,

    #[arg(long, default_value = "data/processed")]
    data_dir: PathBuf,

    /// Output directory for evaluation_report.json and predictions.csv
    #[arg(long, default_value = "reports")]
    output_dir: PathBuf,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Working directory; data/, models/ and reports/ are created beneath it
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    #[command(flatten)]
    sampling: SamplingArgs,

    #[command(flatten)]
    split: SplitArgs,

    #[command(flatten)]
    gbdt: GbdtArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {e}"))?;

    info!("MHD Pricing Trainer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Generate(args) => {
            let as_of = args.sampling.as_of.unwrap_or_else(|| Utc::now().date_naive());
            generate_to(&args.output, args.sampling.samples, args.sampling.seed, as_of)
                .context("Failed to generate sales")?;
        }
        Command::Prepare(args) => {
            let config = PrepConfig {
                test_fraction: args.split.test_size,
                seed: args.split.seed,
            };
            prepare_dir(&args.input, &args.output, &config).context("Failed to prepare data")?;
        }
        Command::Train(args) => {
            train_dir(&args.data_dir, &args.model_dir, args.gbdt.into())
                .context("Failed to train model")?;
        }
        Command::Evaluate(args) => {
            evaluate_dir(&args.model_dir, &args.data_dir, &args.output_dir)
                .context("Failed to evaluate model")?;
        }
        Command::Pipeline(args) => run_pipeline(args)?,
    }

    Ok(())
}

fn run_pipeline(args: PipelineArgs) -> Result<()> {
    let raw = args.workdir.join("data/raw/memphis_housing.csv");
    let processed = args.workdir.join("data/processed");
    let models = args.workdir.join("models");
    let reports = args.workdir.join("reports");
    let as_of = args.sampling.as_of.unwrap_or_else(|| Utc::now().date_naive());

    info!("Step 1/4: generate");
    generate_to(&raw, args.sampling.samples, args.sampling.seed, as_of)
        .context("Failed to generate sales")?;

    info!("Step 2/4: prepare");
    let config = PrepConfig {
        test_fraction: args.split.test_size,
        seed: args.split.seed,
    };
    prepare_dir(&raw, &processed, &config).context("Failed to prepare data")?;

    info!("Step 3/4: train");
    let outcome = train_dir(&processed, &models, args.gbdt.into()).context("Failed to train model")?;

    info!("Step 4/4: evaluate");
    evaluate_dir(&models, &processed, &reports).context("Failed to evaluate model")?;

    info!("✓ Pipeline completed, model hash {}", outcome.model_hash);
    Ok(())
}
