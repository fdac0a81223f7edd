//! Error types for the daemon and its control channel

use std::io;
use std::path::PathBuf;

use skydimo_transport::TransportError;
use thiserror::Error;

/// Errors from LED driver operations
#[derive(Error, Debug)]
pub enum DriverError {
    /// `start` issued before `set port`
    #[error("Serial port is not configured")]
    PortNotConfigured,

    /// Serial layer error
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors from parsing or executing a control line
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Empty command")]
    Empty,

    /// Rejected by the command grammar (unknown verb, arity, range, type)
    #[error("{0}")]
    Invalid(String),

    /// Accepted by the grammar but the driver refused it
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors from bringing up the control socket
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("Error binding socket {}: {source}", path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn listener thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errors loading or saving the persisted driver settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("read/write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
}
