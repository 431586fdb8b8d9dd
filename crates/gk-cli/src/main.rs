//! Jewelry toolkit headless runner
//!
//! Usage:
//!     gk run ring.ron
//!     gk info ring.ron
//!     gk init ring.ron
//!     gk defaults GemstonesAtCurve

mod job;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gk_cad::{FeatureKind, FeatureParams};

use crate::job::{Job, JobError};

/// Run jewelry custom features without a host modeler
#[derive(Parser)]
#[command(name = "gk")]
#[command(version)]
#[command(about = "Gemstones, prongs, channels, cutters and unfold from a job file", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a job and print the feature report
    Run {
        /// RON job file
        job: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the gemstone summaries of a job's result
    Info {
        /// RON job file
        job: PathBuf,
    },

    /// Write a starter job file
    Init {
        /// Destination of the RON job file
        path: PathBuf,
    },

    /// Print the default parameter blob of a feature kind
    Defaults {
        /// Feature kind, e.g. GemstonesAtCurve
        kind: String,
    },
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let fallback = if verbose {
        "gk_cli=debug,gk_cad=debug,gk_core=debug"
    } else {
        "gk_cli=info,gk_cad=info,gk_core=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn to_json(value: &impl serde::Serialize) -> Result<String, JobError> {
    serde_json::to_string_pretty(value).map_err(|e| JobError::Serialize(e.to_string()))
}

fn cmd_run(path: &Path, output: Option<&Path>) -> Result<(), JobError> {
    let job = Job::load(path)?;
    tracing::info!("Running job '{}' ({} steps)", job.name, job.steps.len());
    let session = job.run()?;
    let report = to_json(&session.report(&job.name))?;
    match output {
        Some(out) => {
            std::fs::write(out, report).map_err(|e| JobError::Io(e.to_string()))?;
            tracing::info!("Report written to {}", out.display());
        }
        None => println!("{}", report),
    }
    Ok(())
}

fn cmd_info(path: &Path) -> Result<(), JobError> {
    let job = Job::load(path)?;
    let session = job.run()?;
    let gemstones = session.gemstones();
    if gemstones.is_empty() {
        tracing::warn!("No gemstones found in '{}'", job.name);
    }
    println!("{}", to_json(&gemstones)?);
    Ok(())
}

fn cmd_init(path: &Path) -> Result<(), JobError> {
    Job::sample().save(path)?;
    tracing::info!("Wrote starter job to {}", path.display());
    Ok(())
}

fn cmd_defaults(kind: &str) -> Result<(), JobError> {
    let kind: FeatureKind = kind.parse()?;
    let defaults = FeatureParams::defaults(kind).to_value()?;
    println!("{}", to_json(&defaults)?);
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Run { job, output } => cmd_run(job, output.as_deref()),
        Commands::Info { job } => cmd_info(job),
        Commands::Init { path } => cmd_init(path),
        Commands::Defaults { kind } => cmd_defaults(kind),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
