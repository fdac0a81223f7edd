//! Control command grammar
//!
//! The grammar is defined once, as a clap `Subcommand`. The CLI client embeds
//! it directly, and the daemon parses incoming socket lines with the same
//! definition, so argument shapes and range checks cannot drift apart.
//!
//! ```text
//! fill <r> <g> <b>     each 0-255
//! set port <path>      non-empty
//! set count <n>        1-255
//! set baud <rate>      9600 / 19200 / 38400 / 57600 / 115200 / 230400
//! start
//! stop
//! status
//! version
//! ```
//!
//! Replies are a single line: `OK`, `OK <info>` or `ERROR: <reason>`.

use std::fmt;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use skydimo_transport::{BaudRate, Rgb};
use tracing::{info, warn};

use crate::driver::LedDriver;
use crate::error::ProtocolError;

/// Success reply
pub const OK: &str = "OK";

/// Prefix of every failure reply
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Commands accepted by the daemon
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    /// Fill all LEDs with a solid color
    Fill {
        /// Red component (0-255)
        #[arg(value_parser = channel_parser())]
        r: i64,
        /// Green component (0-255)
        #[arg(value_parser = channel_parser())]
        g: i64,
        /// Blue component (0-255)
        #[arg(value_parser = channel_parser())]
        b: i64,
    },

    /// Configure LED driver settings
    #[command(subcommand)]
    Set(SetCommand),

    /// Open the serial port and start sending frames
    Start,

    /// Stop sending frames and close the serial port
    Stop,

    /// Show driver settings and connection state
    Status,

    /// Show the daemon version
    Version,
}

fn channel_parser() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(0..=255)
}

/// `set` sub-commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum SetCommand {
    /// Configure the serial port for LED communication
    Port {
        /// Serial port path (e.g. /dev/ttyUSB0)
        #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
        port: String,
    },

    /// Configure the total number of LEDs in the strip
    Count {
        /// Number of LEDs (1-255)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=255))]
        count: u8,
    },

    /// Configure the serial baud rate (applies on next start)
    Baud {
        /// 9600, 19200, 38400, 57600, 115200 or 230400
        rate: BaudRate,
    },
}

/// Successful outcome of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    /// `OK` followed by informational text
    Info(String),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ok => write!(f, "{OK}"),
            Reply::Info(text) => write!(f, "{OK} {text}"),
        }
    }
}

/// Wrapper used to parse a socket line (no program name in front)
#[derive(Parser, Debug)]
#[command(name = "skydimo", no_binary_name = true, disable_help_subcommand = true)]
struct CommandLine {
    #[command(subcommand)]
    command: DriverCommand,
}

/// Parse one control line
pub fn parse_line(line: &str) -> Result<DriverCommand, ProtocolError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(ProtocolError::Empty);
    }

    CommandLine::try_parse_from(tokens)
        .map(|parsed| parsed.command)
        .map_err(|e| ProtocolError::Invalid(describe_parse_error(&e)))
}

/// Reduce a clap error to a one-line reason
fn describe_parse_error(err: &clap::Error) -> String {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            "help is only available from the command-line client".to_string()
        }
        ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => "incomplete command".to_string(),
        _ => {
            let rendered = err.to_string();
            let mut lines = rendered.lines().map(str::trim).filter(|l| !l.is_empty());
            let first = lines
                .next()
                .unwrap_or("invalid command")
                .trim_start_matches("error: ");
            // "the following required arguments were not provided:" + names
            match (first.ends_with(':'), lines.next()) {
                (true, Some(detail)) => format!("{first} {detail}"),
                _ => first.to_string(),
            }
        }
    }
}

impl DriverCommand {
    /// Apply the command to `driver`
    pub fn execute(&self, driver: &LedDriver) -> Result<Reply, ProtocolError> {
        match self {
            DriverCommand::Fill { r, g, b } => {
                driver.fill(Rgb::clamped(*r, *g, *b));
            }
            DriverCommand::Set(SetCommand::Port { port }) => {
                driver.set_serial_port(port);
            }
            DriverCommand::Set(SetCommand::Count { count }) => {
                driver.set_led_count(usize::from(*count));
            }
            DriverCommand::Set(SetCommand::Baud { rate }) => {
                driver.set_baud_rate(rate.bps());
            }
            DriverCommand::Start => {
                driver.open_serial_connection()?;
            }
            DriverCommand::Stop => {
                driver.close_serial_connection();
            }
            DriverCommand::Status => {
                let status = driver.status();
                let port = if status.port.is_empty() {
                    "-"
                } else {
                    status.port.as_str()
                };
                return Ok(Reply::Info(format!(
                    "port={} count={} baud={} connected={} ready={}",
                    port, status.led_count, status.baud_rate, status.connected, status.ready
                )));
            }
            DriverCommand::Version => {
                return Ok(Reply::Info(env!("CARGO_PKG_VERSION").to_string()));
            }
        }
        Ok(Reply::Ok)
    }
}

/// Serializes back to the exact text the daemon parses
impl fmt::Display for DriverCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverCommand::Fill { r, g, b } => write!(f, "fill {r} {g} {b}"),
            DriverCommand::Set(SetCommand::Port { port }) => write!(f, "set port {port}"),
            DriverCommand::Set(SetCommand::Count { count }) => write!(f, "set count {count}"),
            DriverCommand::Set(SetCommand::Baud { rate }) => write!(f, "set baud {rate}"),
            DriverCommand::Start => write!(f, "start"),
            DriverCommand::Stop => write!(f, "stop"),
            DriverCommand::Status => write!(f, "status"),
            DriverCommand::Version => write!(f, "version"),
        }
    }
}

/// Parse and run one line, producing the newline-terminated reply
pub fn handle_line(driver: &LedDriver, line: &str) -> String {
    info!("Received command: {line}");
    let outcome = parse_line(line).and_then(|command| command.execute(driver));
    match outcome {
        Ok(reply) => format!("{reply}\n"),
        Err(e) => {
            warn!("Rejected command {line:?}: {e}");
            format!("{ERROR_PREFIX}{e}\n")
        }
    }
}

/// Whether a reply line reports a failure
pub fn is_error_reply(reply: &str) -> bool {
    reply.starts_with(ERROR_PREFIX)
}
