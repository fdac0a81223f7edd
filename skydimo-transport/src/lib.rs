//! Transport layer for Skydimo LED strips
//!
//! This crate provides:
//!
//! - the Adalight frame codec spoken by the strip controller (`protocol`)
//! - a termios serial port (`serial`)
//! - the [`SerialLink`] / [`SerialConnector`] seam the driver is written
//!   against, so it can be exercised without hardware

pub mod error;
pub mod protocol;
pub mod types;

mod serial;

pub use error::TransportError;
pub use serial::{SerialPort, TtyConnector};
pub use types::{BaudRate, Rgb};

/// An open byte channel to the strip controller
pub trait SerialLink: Send {
    /// Write a frame once
    ///
    /// # Returns
    /// Number of bytes accepted; may be less than `frame.len()`
    fn write(&mut self, frame: &[u8]) -> Result<usize, TransportError>;

    /// Close the channel. Must be idempotent.
    fn close(&mut self);

    /// Device path or identifier, for log messages
    fn port_name(&self) -> &str;
}

/// Opens [`SerialLink`]s
pub trait SerialConnector: Send + Sync {
    /// Open and configure `path` at `baud_rate` bits per second
    ///
    /// Fails with [`TransportError::UnsupportedBaudRate`] when the rate is not
    /// one of [`BaudRate::ALL`].
    fn connect(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, TransportError>;
}

/// Type alias for a boxed link
pub type BoxedLink = Box<dyn SerialLink>;
