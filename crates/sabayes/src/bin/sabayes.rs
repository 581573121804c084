//! Command-line entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sabayes::artifacts::summaries_identical;
use sabayes::output::{format_parameters, format_report, to_json_pretty};
use sabayes::{ArtifactSet, Pipeline, PipelineConfig, PipelineError};

/// Hierarchical spatial Bayesian model for census statistical areas
#[derive(Parser, Debug)]
#[command(name = "sabayes", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the tables, fit the model and write the artifacts
    Run {
        /// Pipeline configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory, overriding the configuration
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the report as JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,

        /// List every parameter, not only coefficients and variances
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Reload written artifacts and report them again without re-sampling
    Summarize {
        /// Directory written by `run`
        #[arg(short, long)]
        artifacts: PathBuf,

        /// Print the report as JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,

        /// List every parameter, not only coefficients and variances
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Print a starter configuration
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn execute(command: Command) -> Result<(), PipelineError> {
    match command {
        Command::Run {
            config,
            out,
            json,
            all,
        } => {
            let config = PipelineConfig::from_json_file(&config)?;
            let dir = out.unwrap_or_else(|| config.output_dir.clone());
            let artifacts = Pipeline::new(&config).run_and_save(&dir)?;
            print_report(&artifacts, &artifacts.summary, json, all)
        }
        Command::Summarize {
            artifacts,
            json,
            all,
        } => summarize(&artifacts, json, all),
        Command::InitConfig => {
            println!("{}", PipelineConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn summarize(dir: &Path, json: bool, all: bool) -> Result<(), PipelineError> {
    let artifacts = ArtifactSet::load(dir)?;
    let summary = artifacts.recompute_summary();
    if summaries_identical(&summary, &artifacts.summary) {
        tracing::info!("Recomputed summary matches the persisted one");
    } else {
        tracing::warn!("Recomputed summary differs from summary.csv; reporting the recomputed one");
    }
    print_report(&artifacts, &summary, json, all)
}

fn print_report(
    artifacts: &ArtifactSet,
    summary: &sabayes::TraceSummary,
    json: bool,
    all: bool,
) -> Result<(), PipelineError> {
    if json {
        println!("{}", to_json_pretty(artifacts, summary)?);
    } else {
        print!("{}", format_report(artifacts, summary));
        if all {
            println!("\n  All parameters\n");
            print!("{}", format_parameters(summary));
        }
    }
    Ok(())
}
