//! Command handlers for the CLI application.
//!
//! - `serve`: run the daemon in the foreground
//! - `send`: forward a driver command to a running daemon

pub mod send;
pub mod serve;

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set up a Ctrl-C / SIGTERM handler that sets the returned flag to false.
///
/// Without it the daemon could never exit gracefully, so failure is fatal.
pub fn setup_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    Ok(running)
}
