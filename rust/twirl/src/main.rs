// rust/twirl/src/main.rs

//! Event analysis driver
//!
//! Splits each dataset into work units, runs the configured stages over
//! every event on a local worker pool and writes the summary tables.
//!
//! # Usage
//!
//! ```bash
//! # Run the analysis described in a configuration file
//! twirl --config analysis.toml
//!
//! # One dataset per input file, four workers, at most 10000 events each
//! twirl --config analysis.toml --input-files zz.jsonl ww.jsonl \
//!     --dataset-names ZZ WW -p 4 -n 10000
//!
//! # Print the work unit plan as JSON without reading any event
//! twirl --config analysis.toml --dry-run
//!
//! # Write unit and stage timings next to the tables
//! twirl --config analysis.toml --profile --profile-out-path tbl/profile.txt
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use event_core::{AnalysisConfig, AnalysisError, Dataset, Framework};

/// Event analysis driver
#[derive(Parser, Debug)]
#[command(name = "twirl")]
#[command(about = "Split datasets into work units and fill summary tables")]
#[command(allow_negative_numbers = true)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input files, one dataset per file
    #[arg(long, num_args = 0..)]
    input_files: Vec<PathBuf>,

    /// Dataset names, in the order of the input files
    #[arg(long, num_args = 0..)]
    dataset_names: Vec<String>,

    /// Number of work units processed in parallel
    #[arg(short = 'p', long = "process")]
    process: Option<usize>,

    /// Output directory for the tables
    #[arg(short, long)]
    outdir: Option<PathBuf>,

    /// Quiet mode
    #[arg(short, long)]
    quiet: bool,

    /// Maximum number of events per dataset (-1 for all)
    #[arg(short, long)]
    nevents: Option<i64>,

    /// Maximum number of events per work unit (-1 for no limit)
    #[arg(long)]
    max_events_per_process: Option<i64>,

    /// Maximum number of files per dataset (-1 for all)
    #[arg(long)]
    max_files_per_dataset: Option<i64>,

    /// Maximum number of files per work unit (-1 for no limit)
    #[arg(long)]
    max_files_per_process: Option<i64>,

    /// Record format of the input files (newline, length-prefixed, fixed:N)
    #[arg(long)]
    format: Option<String>,

    /// Recreate tables that already exist
    #[arg(long)]
    force: bool,

    /// Print the work unit plan as JSON and exit
    #[arg(long)]
    dry_run: bool,

    /// Record unit and stage timings
    #[arg(long)]
    profile: bool,

    /// File the timings are written to (printed when not given)
    #[arg(long)]
    profile_out_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Applies command-line flags on top of the loaded configuration.
fn apply_args(config: &mut AnalysisConfig, args: &Args) -> Result<(), AnalysisError> {
    if let Some(process) = args.process {
        config.parallel.processes = process;
    }
    if args.quiet {
        config.parallel.quiet = true;
    }
    if let Some(outdir) = &args.outdir {
        config.output.out_dir = outdir.clone();
    }
    if args.force {
        config.output.force = true;
    }
    if args.profile {
        config.output.profile = true;
    }
    if let Some(path) = &args.profile_out_path {
        config.output.profile_out_path = Some(path.clone());
    }
    if let Some(format) = &args.format {
        config.storage.record_format = format.clone();
    }

    if let Some(n) = args.nevents {
        config.limits.max_events_per_dataset = n;
    }
    if let Some(n) = args.max_events_per_process {
        config.limits.max_events_per_work_unit = n;
    }
    if let Some(n) = args.max_files_per_dataset {
        config.limits.max_files_per_dataset = n;
    }
    if let Some(n) = args.max_files_per_process {
        config.limits.max_files_per_work_unit = n;
    }

    if !args.input_files.is_empty() {
        if !args.dataset_names.is_empty() && args.dataset_names.len() != args.input_files.len() {
            return Err(AnalysisError::config(format!(
                "{} dataset names given for {} input files",
                args.dataset_names.len(),
                args.input_files.len()
            )));
        }

        // Unnamed datasets are named after their input path.
        config.datasets = args
            .input_files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let name = args
                    .dataset_names
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| file.to_string_lossy().into_owned());
                Dataset::new(name, [file.clone()])
            })
            .collect();
    } else if !args.dataset_names.is_empty() {
        return Err(AnalysisError::config("--dataset-names given without --input-files"));
    }

    config.validate()
}

fn load_config(args: &Args) -> Result<AnalysisConfig, AnalysisError> {
    let config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    let mut config = config.with_env_overrides();
    apply_args(&mut config, args)?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let framework = Framework::new(load_config(args)?)?;
    let datasets = framework.datasets();
    if datasets.is_empty() {
        tracing::warn!("No datasets given");
    }

    if args.dry_run {
        let plans = framework.plan(&datasets)?;
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    let report = framework.run(datasets, &framework.analysis())?;
    for path in &report.tables_written {
        println!("{}", path.display());
    }
    if let Some(profile) = &report.profile {
        if framework.config().output.profile_out_path.is_none() {
            print!("{}", profile.render());
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.quiet { "warn" } else { args.log_level.as_str() };
    let filter = tracing_subscriber::filter::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(&args)
}
