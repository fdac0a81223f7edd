//! Skydimo LED strip daemon and control client

use clap::Parser;

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => commands::serve::serve(cli.socket, config)?,
        Commands::Driver(command) => commands::send::send(&cli.socket, &command)?,
    }

    Ok(())
}
