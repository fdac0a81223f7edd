//! Transport error types

use std::io;
use thiserror::Error;

/// Errors that can occur while talking to the serial device
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unable to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Unable to configure tty attributes of {path}: {source}")]
    Attributes {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Unsupported baud rate: {0}")]
    UnsupportedBaudRate(u32),

    #[error("Failed to write to serial port {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Serial port is closed")]
    Closed,
}
