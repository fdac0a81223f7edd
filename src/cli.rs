// CLI definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use skydimo::command::DriverCommand;
use skydimo::listener::DEFAULT_SOCKET_PATH;

#[derive(Parser)]
#[command(name = "skydimo")]
#[command(author, version, about = "Skydimo LED strip daemon and control client")]
pub struct Cli {
    /// Control socket path
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_SOCKET_PATH)]
    pub socket: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the LED daemon in the foreground
    #[command(visible_alias = "daemon")]
    Serve {
        /// Settings file (default: ~/.config/openskydimo/config.json)
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    // === Commands forwarded to a running daemon ===
    #[command(flatten)]
    Driver(DriverCommand),
}
