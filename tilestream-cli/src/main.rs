//! TileStream CLI - Command-line interface
//!
//! `tilestream check` validates a configuration file; `tilestream fly`
//! streams tiles around a simulated moving viewpoint.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod error;

use commands::fly::FlyArgs;

#[derive(Parser)]
#[command(name = "tilestream")]
#[command(about = "Stream imagery and terrain tiles around a moving viewpoint", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file and list accepted and rejected layers
    Check {
        /// Configuration file (default: ~/.tilestream/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Simulate a viewpoint moving along a great-circle heading
    Fly(FlyArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { config } => commands::check::run(config),
        Commands::Fly(args) => commands::fly::run(args),
    };

    if let Err(e) = result {
        e.exit();
    }
}
