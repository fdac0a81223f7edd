//! LED strip driver
//!
//! Owns the serial link and the frame buffer. Every operation takes the same
//! lock, so the command path (listener thread) and the flush path (daemon
//! loop) never observe a half-resized buffer or a link being swapped.

use parking_lot::Mutex;
use skydimo_transport::{protocol, BoxedLink, Rgb, SerialConnector, TtyConnector};
use tracing::{debug, error, info, warn};

use crate::config::{DriverConfig, DEFAULT_BAUD_RATE};
use crate::error::DriverError;

/// Point-in-time view of the driver settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverStatus {
    pub port: String,
    pub led_count: usize,
    pub baud_rate: u32,
    pub connected: bool,
    pub ready: bool,
}

struct DriverState {
    port: String,
    led_count: usize,
    baud_rate: u32,
    link: Option<BoxedLink>,
    frame: Vec<u8>,
    ready: bool,
}

impl DriverState {
    fn refresh_readiness(&mut self) {
        self.ready = self.link.is_some() && self.led_count > 0;
    }

    fn close_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close();
        }
        self.refresh_readiness();
    }
}

/// Serialized access to one LED strip
pub struct LedDriver {
    connector: Box<dyn SerialConnector>,
    state: Mutex<DriverState>,
}

impl LedDriver {
    /// Unconfigured driver talking to real tty devices
    pub fn new() -> Self {
        Self::with_connector(Box::new(TtyConnector))
    }

    /// Unconfigured driver using `connector` to open links
    pub fn with_connector(connector: Box<dyn SerialConnector>) -> Self {
        Self {
            connector,
            state: Mutex::new(DriverState {
                port: String::new(),
                led_count: 0,
                baud_rate: DEFAULT_BAUD_RATE,
                link: None,
                frame: protocol::resize(0),
                ready: false,
            }),
        }
    }

    /// Driver restored from persisted settings. The link stays closed.
    pub fn from_config(config: &DriverConfig, connector: Box<dyn SerialConnector>) -> Self {
        let driver = Self::with_connector(connector);
        driver.set_serial_port(&config.serial_port);
        driver.set_led_count(config.led_count);
        driver.set_baud_rate(config.baud_rate);
        driver
    }

    /// Settings worth persisting
    pub fn to_config(&self) -> DriverConfig {
        let state = self.state.lock();
        DriverConfig {
            serial_port: state.port.clone(),
            led_count: state.led_count,
            baud_rate: state.baud_rate,
        }
    }

    pub fn set_serial_port(&self, port: &str) {
        let mut state = self.state.lock();
        debug!("Serial port set to {:?}", port);
        state.port = port.to_string();
    }

    /// Takes effect on the next `open_serial_connection`
    pub fn set_baud_rate(&self, baud_rate: u32) {
        let mut state = self.state.lock();
        debug!("Baud rate set to {}", baud_rate);
        state.baud_rate = baud_rate;
    }

    /// Resize the frame for `led_count` LEDs.
    ///
    /// Previous pixel contents are discarded (the new frame is black).
    pub fn set_led_count(&self, led_count: usize) {
        let mut state = self.state.lock();
        debug!("LED count set to {}", led_count);
        state.led_count = led_count;
        state.frame = protocol::resize(led_count);
        state.refresh_readiness();
    }

    /// Open the configured port at the configured baud rate.
    ///
    /// An already open link is closed first. On failure the driver keeps
    /// whatever state it had before the call.
    pub fn open_serial_connection(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        if state.port.is_empty() {
            error!("Cannot open serial connection: no port configured");
            return Err(DriverError::PortNotConfigured);
        }

        let link = match self.connector.connect(&state.port, state.baud_rate) {
            Ok(link) => link,
            Err(e) => {
                error!("{e}");
                return Err(e.into());
            }
        };

        state.close_link();
        info!(
            "Serial connection open on {} ({} baud)",
            state.port, state.baud_rate
        );
        state.link = Some(link);
        state.refresh_readiness();
        Ok(())
    }

    /// Close the link if open. Idempotent.
    pub fn close_serial_connection(&self) {
        self.state.lock().close_link();
    }

    /// Stage `color` on every LED. Works whether or not the link is open.
    pub fn fill(&self, color: Rgb) {
        let mut state = self.state.lock();
        debug!("Filling {} LEDs with RGB{}", state.led_count, color);
        let led_count = state.led_count;
        protocol::fill(&mut state.frame, led_count, color);
    }

    /// Write the current frame to the strip if ready.
    ///
    /// Short writes are logged and not retried; the next flush sends a whole
    /// new frame. A failed write closes the link.
    pub fn send_colors(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.ready {
            return;
        }
        let Some(link) = state.link.as_mut() else {
            return;
        };

        match link.write(&state.frame) {
            Ok(written) if written == state.frame.len() => {
                debug!("Sent {} bytes to {}", written, link.port_name());
            }
            Ok(written) => {
                warn!(
                    "Incomplete write to {}: {}/{} bytes",
                    link.port_name(),
                    written,
                    state.frame.len()
                );
            }
            Err(e) => {
                error!("{e}; closing serial connection");
                state.close_link();
            }
        }
    }

    pub fn is_ready_to_send(&self) -> bool {
        self.state.lock().ready
    }

    pub fn status(&self) -> DriverStatus {
        let state = self.state.lock();
        DriverStatus {
            port: state.port.clone(),
            led_count: state.led_count,
            baud_rate: state.baud_rate,
            connected: state.link.is_some(),
            ready: state.ready,
        }
    }

    #[cfg(test)]
    fn frame(&self) -> Vec<u8> {
        self.state.lock().frame.clone()
    }
}

impl Default for LedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LedDriver {
    fn drop(&mut self) {
        self.state.get_mut().close_link();
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use skydimo_transport::TransportError;
    use std::sync::Arc;

    #[test]
    fn test_fill_every_count() {
        let (driver, _) = mock_driver();
        let color = Rgb::new(7, 8, 9);
        for n in 1..=255usize {
            driver.set_led_count(n);
            driver.fill(color);
            let frame = driver.frame();
            assert_eq!(frame.len(), 6 + 3 * n);
            assert_eq!(&frame[..6], &[b'A', b'd', b'a', 0, 0, n as u8]);
            assert!(frame[6..].chunks_exact(3).all(|p| p == [7, 8, 9]));
        }
    }

    #[test]
    fn test_resize_then_flush_without_fill() {
        let (driver, log) = mock_driver();
        driver.set_serial_port("/dev/ttyUSB0");
        driver.set_led_count(10);
        driver.fill(Rgb::WHITE);
        driver.open_serial_connection().unwrap();

        driver.set_led_count(3);
        driver.send_colors();

        let log = log.lock();
        assert_eq!(log.frames.len(), 1);
        assert_eq!(log.frames[0].len(), 6 + 9);
        assert_eq!(log.frames[0][5], 3);
    }

    #[test]
    fn test_readiness_tracks_link_and_count() {
        let (driver, _) = mock_driver();
        assert!(!driver.is_ready_to_send());

        driver.set_serial_port("/dev/ttyUSB0");
        driver.open_serial_connection().unwrap();
        // open but no LEDs
        assert!(!driver.is_ready_to_send());

        driver.set_led_count(5);
        assert!(driver.is_ready_to_send());

        driver.set_led_count(0);
        assert!(!driver.is_ready_to_send());

        driver.set_led_count(5);
        assert!(driver.is_ready_to_send());

        driver.close_serial_connection();
        assert!(!driver.is_ready_to_send());
    }

    #[test]
    fn test_open_requires_port() {
        let (driver, log) = mock_driver();
        driver.set_led_count(4);
        assert!(matches!(
            driver.open_serial_connection(),
            Err(DriverError::PortNotConfigured)
        ));
        assert!(!driver.is_ready_to_send());
        assert!(log.lock().opened.is_empty());
    }

    #[test]
    fn test_open_failure_keeps_previous_link() {
        let (driver, log) = mock_driver();
        driver.set_serial_port("/dev/ttyUSB0");
        driver.set_led_count(2);
        driver.open_serial_connection().unwrap();

        driver.set_serial_port("/dev/missing");
        assert!(driver.open_serial_connection().is_err());
        assert!(driver.is_ready_to_send());
        assert_eq!(log.lock().closes, 0);
    }

    #[test]
    fn test_unsupported_baud_fails_open() {
        let (driver, _) = mock_driver();
        driver.set_serial_port("/dev/ttyUSB0");
        driver.set_baud_rate(12_345);
        let err = driver.open_serial_connection().unwrap_err();
        assert!(matches!(
            err,
            DriverError::Transport(TransportError::UnsupportedBaudRate(12_345))
        ));
    }

    #[test]
    fn test_reopen_closes_old_link() {
        let (driver, log) = mock_driver();
        driver.set_serial_port("/dev/ttyUSB0");
        driver.open_serial_connection().unwrap();
        driver.open_serial_connection().unwrap();
        let log = log.lock();
        assert_eq!(log.opened.len(), 2);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let (driver, log) = mock_driver();
        driver.close_serial_connection();
        driver.set_serial_port("/dev/ttyUSB0");
        driver.open_serial_connection().unwrap();
        driver.close_serial_connection();
        driver.close_serial_connection();
        assert_eq!(log.lock().closes, 1);
        assert!(!driver.status().connected);
    }

    #[test]
    fn test_send_colors_noop_when_not_ready() {
        let (driver, log) = mock_driver();
        driver.set_led_count(3);
        driver.fill(Rgb::WHITE);
        driver.send_colors();
        assert!(log.lock().frames.is_empty());
    }

    #[test]
    fn test_fill_before_open_is_sent() {
        let (driver, log) = mock_driver();
        driver.set_led_count(10);
        driver.fill(Rgb::new(1, 2, 3));
        driver.set_serial_port("/dev/ttyUSB0");
        driver.open_serial_connection().unwrap();
        driver.send_colors();

        let log = log.lock();
        let frame = &log.frames[0];
        assert_eq!(&frame[..6], &[b'A', b'd', b'a', 0, 0, 10]);
        assert_eq!(frame[6..].len(), 30);
        assert!(frame[6..].chunks_exact(3).all(|p| p == [1, 2, 3]));
    }

    #[test]
    fn test_short_write_keeps_link() {
        let (driver, log) = mock_driver_with(2, false);
        driver.set_serial_port("/dev/ttyUSB0");
        driver.set_led_count(4);
        driver.open_serial_connection().unwrap();
        driver.send_colors();
        driver.send_colors();

        assert!(driver.is_ready_to_send());
        let log = log.lock();
        assert_eq!(log.frames.len(), 2);
        assert_eq!(log.frames[0].len(), 6 + 12 - 2);
    }

    #[test]
    fn test_failed_write_closes_link() {
        let (driver, log) = mock_driver_with(0, true);
        driver.set_serial_port("/dev/ttyUSB0");
        driver.set_led_count(4);
        driver.open_serial_connection().unwrap();
        assert!(driver.is_ready_to_send());

        driver.send_colors();
        assert!(!driver.is_ready_to_send());
        assert!(!driver.status().connected);
        assert_eq!(log.lock().closes, 1);
    }

    #[test]
    fn test_config_round_trip() {
        let config = DriverConfig {
            serial_port: "/dev/ttyACM0".into(),
            led_count: 42,
            baud_rate: 57_600,
        };
        let (_, log) = mock_driver();
        let driver = LedDriver::from_config(
            &config,
            Box::new(MockConnector {
                log,
                short_by: 0,
                fail_writes: false,
            }),
        );
        assert_eq!(driver.to_config(), config);
        assert_eq!(driver.frame().len(), 6 + 3 * 42);
        assert!(!driver.status().connected);
    }

    #[test]
    fn test_drop_closes_link() {
        let (driver, log) = mock_driver();
        driver.set_serial_port("/dev/ttyUSB0");
        driver.open_serial_connection().unwrap();
        drop(driver);
        assert_eq!(log.lock().closes, 1);
    }

    #[test]
    fn test_concurrent_resize_and_flush() {
        let (driver, log) = mock_driver();
        let driver = Arc::new(driver);
        driver.set_serial_port("/dev/ttyUSB0");
        driver.set_led_count(1);
        driver.open_serial_connection().unwrap();

        let flusher = {
            let driver = Arc::clone(&driver);
            std::thread::spawn(move || {
                for _ in 0..500 {
                    driver.send_colors();
                }
            })
        };
        for i in 0..500usize {
            driver.set_led_count(i % 50 + 1);
            driver.fill(Rgb::new(i as u8, 0, 0));
        }
        flusher.join().unwrap();

        for frame in &log.lock().frames {
            let n = frame[5] as usize;
            assert_eq!(frame.len(), 6 + 3 * n);
        }
    }
}
