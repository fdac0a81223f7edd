//! Daemon main loop
//!
//! Loads the persisted settings, starts the control socket and pushes the
//! current frame to the strip every [`FLUSH_INTERVAL`] until either the
//! listener dies or a shutdown is requested.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use skydimo_transport::{SerialConnector, TtyConnector};
use tracing::{debug, error, info, warn};

use crate::config::DriverConfig;
use crate::driver::LedDriver;
use crate::listener::{CommandListener, DEFAULT_SOCKET_PATH};

/// Time between frame flushes
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Where the daemon listens and keeps its settings
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    pub socket_path: PathBuf,
    pub config_path: PathBuf,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            config_path: DriverConfig::default_path(),
        }
    }
}

/// Why the main loop returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown flag was cleared (Ctrl-C / SIGTERM)
    Shutdown,
    /// The listener's service thread stopped on its own
    ListenerStopped,
}

/// Run the daemon against real serial devices.
///
/// `running` is cleared by the signal handler to request a graceful exit.
pub fn run(options: &DaemonOptions, running: &AtomicBool) -> ExitReason {
    run_with_connector(options, Box::new(TtyConnector), running)
}

/// Run the daemon with the given serial connector.
pub fn run_with_connector(
    options: &DaemonOptions,
    connector: Box<dyn SerialConnector>,
    running: &AtomicBool,
) -> ExitReason {
    let config = DriverConfig::load_or_default(&options.config_path);
    let driver = Arc::new(LedDriver::from_config(&config, connector));
    let mut listener = CommandListener::new(&options.socket_path, Arc::clone(&driver));

    run_until_exit(options, &driver, &mut listener, running)
}

/// Serve, then close the link and persist the settings if the exit was
/// requested.
fn run_until_exit(
    options: &DaemonOptions,
    driver: &LedDriver,
    listener: &mut CommandListener,
    running: &AtomicBool,
) -> ExitReason {
    let reason = serve_with(driver, listener, running);

    driver.close_serial_connection();

    if reason == ExitReason::Shutdown {
        let config = driver.to_config();
        match config.save(&options.config_path) {
            Ok(()) => info!("Saved config to {}", options.config_path.display()),
            Err(e) => error!("Failed to save config: {e}"),
        }
    }

    info!("Daemon exiting ({reason:?})");
    reason
}

/// Start a listener on `socket_path` and flush frames until told to stop.
pub fn serve(driver: &Arc<LedDriver>, socket_path: &Path, running: &AtomicBool) -> ExitReason {
    let mut listener = CommandListener::new(socket_path, Arc::clone(driver));
    serve_with(driver, &mut listener, running)
}

/// Flush frames until `running` is cleared or `listener` dies.
///
/// The listener is started if it is not running yet. If the control socket
/// cannot be bound the loop still runs, stopping only when `running` is
/// cleared.
pub fn serve_with(
    driver: &LedDriver,
    listener: &mut CommandListener,
    running: &AtomicBool,
) -> ExitReason {
    let control = listener.start().is_ok();
    if !control {
        warn!("Control socket unavailable, running until shutdown");
    }

    let reason = loop {
        if !running.load(Ordering::SeqCst) {
            break ExitReason::Shutdown;
        }
        if control && listener.should_stop() {
            break ExitReason::ListenerStopped;
        }

        if driver.is_ready_to_send() {
            driver.send_colors();
        }
        std::thread::sleep(FLUSH_INTERVAL);
    };

    debug!("Main loop finished: {reason:?}");
    listener.stop();
    reason
}
