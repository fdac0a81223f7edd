//! Daemon entry point.

use anyhow::{bail, Result};
use std::path::PathBuf;
use tracing::info;

use skydimo::config::DriverConfig;
use skydimo::daemon::{self, DaemonOptions, ExitReason};

/// Run the daemon until Ctrl-C / SIGTERM or until the listener dies
pub fn serve(socket_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skydimo=info,skydimo_transport=info".into()),
        )
        .init();

    let running = super::setup_interrupt_handler()?;

    let options = DaemonOptions {
        socket_path,
        config_path: config_path.unwrap_or_else(DriverConfig::default_path),
    };
    info!(
        "Starting skydimo {} (socket {}, config {})",
        env!("CARGO_PKG_VERSION"),
        options.socket_path.display(),
        options.config_path.display()
    );

    exit_status(daemon::run(&options, &running))
}

fn exit_status(reason: ExitReason) -> Result<()> {
    match reason {
        ExitReason::Shutdown => Ok(()),
        ExitReason::ListenerStopped => bail!("Control socket listener stopped unexpectedly"),
    }
}
