//! gofpower CLI

mod run_config;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use gp_datasets::{CachePolicy, Dataset, Provenance};
use gp_inference::{GoodnessOfFit, ParametricModelFactory, TestMode, run_experiment};

use crate::run_config::RunConfig;

#[derive(Parser)]
#[command(name = "gofpower")]
#[command(about = "gofpower - power studies for goodness-of-fit tests")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate (or load) the dataset described by a run file
    Generate {
        /// Run file (JSON with a "dataset" section)
        #[arg(short, long)]
        config: PathBuf,

        /// Dataset root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Regenerate even if a cached artifact exists
        #[arg(long)]
        force: bool,

        /// Output file for the summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the configured test over every trial of the dataset
    Run {
        /// Run file (JSON with "dataset" and "gof" sections)
        #[arg(short, long)]
        config: PathBuf,

        /// Dataset root directory
        #[arg(short, long)]
        root: PathBuf,

        /// Regenerate the dataset even if a cached artifact exists
        #[arg(long)]
        force: bool,

        /// Output file for results (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// List test modes
    Modes,

    /// Print version
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Generate { config, root, force, output } => {
            cmd_generate(&config, &root, force, output.as_deref())
        }
        Commands::Run { config, root, force, output, threads } => {
            cmd_run(&config, &root, force, output.as_deref(), threads)
        }
        Commands::Modes => cmd_modes(),
        Commands::Version => {
            println!("gofpower {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn cache_policy(force: bool) -> CachePolicy {
    if force { CachePolicy::ForceRegenerate } else { CachePolicy::Reuse }
}

fn open_dataset(cfg: &RunConfig, root: &Path, force: bool) -> Result<Dataset> {
    let ds = Dataset::open_with(root, cfg.dataset.clone(), cache_policy(force))?;
    tracing::info!(
        name = ds.data_name(),
        fingerprint = ds.fingerprint(),
        cached = ds.provenance() == Provenance::Cached,
        "dataset ready"
    );
    Ok(ds)
}

fn cmd_generate(config: &Path, root: &Path, force: bool, output: Option<&Path>) -> Result<()> {
    let cfg = RunConfig::load(config)?;
    let ds = open_dataset(&cfg, root, force)?;

    let output_json = serde_json::json!({
        "data_name": ds.data_name(),
        "fingerprint": ds.fingerprint(),
        "provenance": match ds.provenance() {
            Provenance::Generated => "generated",
            Provenance::Cached => "cached",
        },
        "artifact": ds.artifact_path(),
        "num_trials": ds.len(),
        "num_samples": ds.config().num_samples(),
        "dim": ds.config().dim(),
    });
    write_json(output, output_json)
}

fn cmd_run(
    config: &Path,
    root: &Path,
    force: bool,
    output: Option<&Path>,
    threads: usize,
) -> Result<()> {
    let cfg = RunConfig::load(config)?;
    let gof_cfg = cfg.require_gof()?.clone();
    let gof = GoodnessOfFit::new(gof_cfg, Box::new(ParametricModelFactory))?;
    let ds = open_dataset(&cfg, root, force)?;

    let result = run_experiment(&ds, &gof, threads)?;
    tracing::info!(
        mode = %result.test_mode,
        trials = result.num_trials,
        rejection_rate = result.rejection_rate,
        wall_s = result.wall_s,
        "run complete"
    );

    write_json(output, serde_json::to_value(&result)?)
}

fn cmd_modes() -> Result<()> {
    let modes: Vec<serde_json::Value> = TestMode::ALL
        .iter()
        .map(|m| serde_json::json!({ "mode": m.as_str(), "builtin": m.is_builtin() }))
        .collect();
    write_json(None, serde_json::Value::Array(modes))
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
