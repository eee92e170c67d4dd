#![warn(missing_docs)]
//! Segscan CLI Library
//!
//! Infrastructure for the `segscan` binary: argument parsing, configuration
//! layering (segscan.toml with CLI overrides), input generation/loading, the
//! worker coordinator, and report output.
//!
//! The same binary serves as both coordinator and worker: the coordinator
//! re-invokes itself with the hidden `--scan-worker` flag and an inherited
//! fd pair for each spawned worker process.

mod config;
mod coordinator;
mod input;
mod report;

pub use config::{ConfigError, IsolationMode, SegscanConfig};
pub use coordinator::{ScanError, WorkerOutcome, run_workers};
pub use input::{generate_input_file, load_input};
pub use report::{aggregate_outcomes, build_report};

use clap::Parser;
use segscan_core::WorkerMain;
use segscan_report::{OutputFormat, format_human_output, generate_json_report};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;

/// Segscan CLI arguments
#[derive(Parser, Debug)]
#[command(name = "segscan")]
#[command(author, version, about = "segscan - parallel segmented array scanner")]
pub struct Cli {
    /// Array length (L); falls back to segscan.toml, then 100000
    pub length: Option<usize>,

    /// Global cap on reported hidden-key findings (H)
    pub hidden_cap: Option<usize>,

    /// Number of workers (PN)
    pub workers: Option<usize>,

    /// Isolation mode: process, thread, or in-process
    #[arg(long)]
    pub isolation: Option<IsolationMode>,

    /// Input file path
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Reuse an existing input file instead of generating a fresh one
    #[arg(long)]
    pub no_generate: bool,

    /// Output format: json, human
    #[arg(long)]
    pub format: Option<String>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Per-worker record wait in seconds
    #[arg(long)]
    pub worker_timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by the coordinator)
    #[arg(long, hide = true)]
    pub scan_worker: bool,
}

/// Run the segscan CLI with the given arguments.
/// This is the main entry point for the binary.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the segscan CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Handle worker mode first (before any other initialization)
    if cli.scan_worker {
        return run_worker_mode();
    }

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("segscan=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("segscan=info")
            .init();
    }

    // Discover segscan.toml configuration (CLI flags override)
    let mut config = SegscanConfig::discover().unwrap_or_default();
    if let Some(length) = cli.length {
        config.input.length = length;
    }
    if let Some(hidden_cap) = cli.hidden_cap {
        config.scan.hidden_cap = hidden_cap;
    }
    if let Some(workers) = cli.workers {
        config.scan.workers = workers;
    }
    if let Some(isolation) = cli.isolation {
        config.scan.isolation = isolation;
    }
    if let Some(ref input) = cli.input {
        config.input.path = input.display().to_string();
    }
    if let Some(ref format) = cli.format {
        config.output.format = format.clone();
    }
    if let Some(secs) = cli.worker_timeout {
        config.scan.worker_timeout = format!("{secs}s");
    }

    config.validate()?;

    let format: OutputFormat = config
        .output
        .format
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let timeout_ns = SegscanConfig::parse_duration(&config.scan.worker_timeout)?;
    let timeout = Duration::from_nanos(timeout_ns);

    let start_time = Instant::now();

    // Prepare the input array
    if !cli.no_generate {
        info!(
            path = %config.input.path,
            length = config.input.length,
            "generating input file"
        );
        generate_input_file(&config.input.path, config.input.length)?;
    }
    let values = load_input(&config.input.path, config.input.length)?;

    info!(
        workers = config.scan.workers,
        isolation = config.scan.isolation.as_str(),
        hidden_cap = config.scan.hidden_cap,
        "running scan"
    );

    // Fan out, drain in worker-index order, join, aggregate
    let outcomes = run_workers(&values, config.scan.workers, config.scan.isolation, timeout)?;
    let stats = aggregate_outcomes(&outcomes, config.scan.hidden_cap, values.len());

    let total_duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;
    let report = build_report(&outcomes, &stats, &config, total_duration_ms);

    if report.summary.workers_failed > 0 {
        info!(
            failed = report.summary.workers_failed,
            total = report.summary.workers_total,
            "run completed with degraded results"
        );
    }

    // Generate output
    let output = match format {
        OutputFormat::Json => generate_json_report(&report)?,
        OutputFormat::Human => format_human_output(&report),
    };

    let output_path = cli
        .output
        .or_else(|| config.output.path.as_ref().map(PathBuf::from));
    if let Some(path) = output_path {
        let mut file = std::fs::File::create(&path)?;
        file.write_all(output.as_bytes())?;
        println!("Report written to: {}", path.display());
    } else {
        print!("{output}");
    }

    Ok(())
}

/// Run as a worker process (IPC mode). Exits with the assigned worker id.
fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::new();
    let worker_id = worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))?;
    std::process::exit(worker_id);
}
