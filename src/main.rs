use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use spotcalc::core::AggregationMode;
use spotcalc::core::log::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

fn parse_mode(s: &str) -> Result<AggregationMode, String> {
    s.parse().map_err(|e: anyhow::Error| e.to_string())
}

impl From<Commands> for spotcalc::AppCommand {
    fn from(cmd: Commands) -> spotcalc::AppCommand {
        match cmd {
            Commands::Spot { mode, export } => spotcalc::AppCommand::Spot { mode, export },
            Commands::Resolve { isins } => spotcalc::AppCommand::Resolve { isins },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Compute per-underlying and weighted global spots
    Spot {
        /// Aggregation mode for this run: mean, max or min (overrides the config)
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<AggregationMode>,

        /// Write the results table to this CSV file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },
    /// Show the reference data behind one or more ISINs
    Resolve {
        #[arg(required = true)]
        isins: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => spotcalc::cli::setup::setup(),
        Some(cmd) => spotcalc::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
