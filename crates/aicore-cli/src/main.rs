//! aicore CLI application
//!
//! Inspect the target platform configuration, build reference tiling plans
//! and run kernels on host data.

use std::path::PathBuf;

use aicore_cli::commands::{ConfigAction, InfoCommand, PlanCommand, ScatterCommand};
use aicore_cli::exit::exit_code_for;
use aicore_cli::output::{LogFormat, setup_logging};
use aicore_common::SocConfig;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, error};

/// aicore - vector-unit kernel toolkit
#[derive(Parser)]
#[command(name = "aicore")]
#[command(about = "Inspect, plan and run aicore vector-unit kernels")]
#[command(long_about = r#"
Drives the aicore kernels from the command line.

Examples:
  # Show the platform resolved from soc.toml and AICORE_* variables
  aicore --config soc.toml info

  # Reference tiling blob for var [4, 8] and indices [2, 1]
  aicore plan --var-shape 4,8 --indices-shape 2,1 --dtype float32

  # Run scatter_nd_add on a JSON job
  aicore scatter --job job.json
"#)]
#[command(version)]
struct Cli {
    /// Platform configuration file (TOML); defaults plus AICORE_* variables when omitted
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, value_name = "LEVEL", global = true, default_value = "warn")]
    log_level: String,

    /// Log line format
    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show platform information
    Info(InfoCommand),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Build a scatter_nd_add tiling plan
    Plan(PlanCommand),

    /// Run scatter_nd_add on a JSON job
    Scatter(ScatterCommand),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli.log_level, cli.log_format) {
        eprintln!("{e:#}");
        std::process::exit(aicore_cli::exit::EXIT_GENERIC_FAIL);
    }

    if let Err(e) = run(cli) {
        error!("Command failed: {}", e);
        for cause in e.chain().skip(1) {
            error!("  Caused by: {}", cause);
        }
        eprintln!("error: {e:#}");
        std::process::exit(exit_code_for(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    let soc = load_configuration(cli.config.as_deref())?;
    debug!("resolved configuration: {soc:?}");

    match cli.command {
        Commands::Info(cmd) => cmd.run(&soc),
        Commands::Config { action } => action.run(&soc),
        Commands::Plan(cmd) => cmd.run(&soc),
        Commands::Scatter(cmd) => cmd.run(&soc),
    }
}

/// File (when given) then environment overrides, validated.
fn load_configuration(path: Option<&std::path::Path>) -> Result<SocConfig> {
    match path {
        Some(path) => SocConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => SocConfig::from_env().context("failed to resolve configuration from environment"),
    }
}
