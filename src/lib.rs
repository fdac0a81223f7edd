// Skydimo LED strip driver - shared library
// Driver state, command grammar, control socket and daemon loop

pub mod client;
pub mod command;
pub mod config;
pub mod daemon;
pub mod driver;
pub mod error;
pub mod listener;

pub use command::{DriverCommand, Reply, SetCommand};
pub use config::DriverConfig;
pub use driver::{DriverStatus, LedDriver};
pub use error::{ConfigError, DriverError, ListenerError, ProtocolError};
pub use listener::{CommandListener, DEFAULT_SOCKET_PATH};
pub use skydimo_transport::{BaudRate, Rgb};
