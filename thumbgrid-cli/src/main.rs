//! thumbgrid CLI
//!
//! Lays out item lists, inspects disk thumbnail caches, and replays scripted
//! scrolls against a simulated generation service.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thumbgrid::config::{config_file_path, ConfigFile};
use thumbgrid::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::layout::LayoutArgs;
use commands::probe::ProbeArgs;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "thumbgrid", version, about = "Photo grid layout and thumbnail scheduling tools")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Pack a JSON list of media items into grid rows
    Layout(LayoutArgs),

    /// Check content hashes against a disk thumbnail cache
    Probe(ProbeArgs),

    /// Scroll through a synthetic library against a simulated generator
    Simulate(SimulateArgs),

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(config_file_path);

    if let Commands::Config { command } = cli.command {
        return commands::config::run(command, &config_path);
    }

    let config = ConfigFile::load_from(&config_path)?;
    // Logging before the runtime: local time offsets are only read while
    // the process is single-threaded.
    let _guard = init_cli_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Layout(args) => commands::layout::run(args, &config),
        Commands::Probe(args) => block_on(commands::probe::run(args, &config)),
        Commands::Simulate(args) => block_on(commands::simulate::run(args, &config)),
        Commands::Config { .. } => Ok(()),
    }
}

fn init_cli_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let mut logging = config.logging.clone();
    if verbose {
        logging.filter = "thumbgrid=debug".to_string();
    }
    Ok(init_logging(&logging)?)
}

fn block_on<F>(future: F) -> Result<(), CliError>
where
    F: std::future::Future<Output = Result<(), CliError>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;
    runtime.block_on(future)
}
