//! fieldcheck CLI - Main Entry Point
//!
//! Runs the dependency-ordered integration suite against a CRM API and
//! inspects the resulting reports.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use fieldcheck_cli::commands::{curl, init, list, plan, run};
use fieldcheck_cli::output::OutputFormat;
use fieldcheck_e2e::HarnessConfig;

/// fieldcheck - Integration test runner for the field-service CRM API
#[derive(Parser)]
#[command(name = "fieldcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "FIELDCHECK_CONFIG", default_value = "fieldcheck.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the suite, or a selection of it
    Run(run::RunArgs),

    /// List registered tests
    List(list::ListArgs),

    /// List test categories
    Categories,

    /// Show the execution order for a selection
    Plan(plan::PlanArgs),

    /// Print curl commands for requests captured in a report
    Curl(curl::CurlArgs),

    /// Write a default configuration file
    Init(init::InitArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Run(args) => run::execute(args, load_config(&cli.config)?, cli.format).await?,
        Commands::List(args) => list::execute(args, cli.format)?,
        Commands::Categories => list::categories(cli.format)?,
        Commands::Plan(args) => plan::execute(args, &load_config(&cli.config)?, cli.format)?,
        Commands::Curl(args) => curl::execute(args, cli.format)?,
        Commands::Init(args) => init::execute(args, &cli.config)?,
        Commands::Version => {
            println!("fieldcheck v{}", env!("CARGO_PKG_VERSION"));
            println!("common v{}", fieldcheck_common::VERSION);
        }
    }

    Ok(())
}

fn load_config(path: &std::path::Path) -> anyhow::Result<HarnessConfig> {
    let mut config = HarnessConfig::load(path)
        .with_context(|| format!("cannot load {}", path.display()))?;
    config.apply_env();
    Ok(config)
}
