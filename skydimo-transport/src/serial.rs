//! termios-backed serial port for the strip controller

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use tracing::{debug, info};

use crate::error::TransportError;
use crate::types::BaudRate;
use crate::{SerialConnector, SerialLink};

/// Inter-byte read timeout in deciseconds (VTIME)
const READ_TIMEOUT_DECIS: libc::cc_t = 10;

/// An open, configured serial device
///
/// The descriptor is closed on [`SerialPort::close`] or when the port is dropped.
pub struct SerialPort {
    path: String,
    file: Option<File>,
}

impl SerialPort {
    /// Open `path` and configure it for raw 8N1 at `baud_rate` bits per second.
    ///
    /// Any failure after the device was opened closes it again before
    /// returning.
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, TransportError> {
        let baud = BaudRate::try_from(baud_rate)?;

        info!("Opening serial port {} at {} baud", path, baud);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;

        configure(&file, baud).map_err(|source| TransportError::Attributes {
            path: path.to_string(),
            source,
        })?;

        Ok(Self {
            path: path.to_string(),
            file: Some(file),
        })
    }

    /// Device path this port was opened from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the descriptor is still open
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Write `bytes` once, returning how many were accepted.
    ///
    /// A short count is not an error; callers decide whether to care.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        let file = self.file.as_mut().ok_or(TransportError::Closed)?;
        file.write(bytes).map_err(|source| TransportError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Close the descriptor. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            info!("Closing serial port {}", self.path);
        }
    }
}

impl Drop for SerialPort {
    fn drop(&mut self) {
        self.close();
    }
}

impl SerialLink for SerialPort {
    fn write(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        SerialPort::write(self, frame)
    }

    fn close(&mut self) {
        SerialPort::close(self);
    }

    fn port_name(&self) -> &str {
        &self.path
    }
}

/// Opens real tty devices
#[derive(Debug, Clone, Copy, Default)]
pub struct TtyConnector;

impl SerialConnector for TtyConnector {
    fn connect(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialLink>, TransportError> {
        Ok(Box::new(SerialPort::open(path, baud_rate)?))
    }
}

/// Put the tty into raw 8N1 mode without flow control.
///
/// Reads return whatever is available, waiting at most one second.
fn configure(file: &File, baud: BaudRate) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let mut tty: libc::termios = unsafe { std::mem::zeroed() };

    if unsafe { libc::tcgetattr(fd, &mut tty) } != 0 {
        return Err(io::Error::last_os_error());
    }

    // 8 data bits, no parity, 1 stop bit, no RTS/CTS
    tty.c_cflag &= !(libc::PARENB | libc::CSTOPB | libc::CSIZE | libc::CRTSCTS);
    tty.c_cflag |= libc::CS8 | libc::CREAD | libc::CLOCAL;

    tty.c_iflag &= !(libc::IXON | libc::IXOFF | libc::IXANY);
    tty.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL);

    tty.c_oflag &= !(libc::OPOST | libc::ONLCR);

    tty.c_lflag &= !(libc::ICANON | libc::ECHO | libc::ECHOE | libc::ECHONL | libc::ISIG);

    tty.c_cc[libc::VTIME] = READ_TIMEOUT_DECIS;
    tty.c_cc[libc::VMIN] = 0;

    let speed = baud.speed();
    if unsafe { libc::cfsetispeed(&mut tty, speed) } != 0
        || unsafe { libc::cfsetospeed(&mut tty, speed) } != 0
    {
        return Err(io::Error::last_os_error());
    }

    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tty) } != 0 {
        return Err(io::Error::last_os_error());
    }

    debug!("Configured fd {} for raw 8N1 at {} baud", fd, baud);
    Ok(())
}
