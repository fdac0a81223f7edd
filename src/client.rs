//! Control socket client

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

/// Send one command line and wait for the reply line.
///
/// Returns the reply without its trailing newline, or an empty string if the
/// daemon closed the connection without answering.
pub fn send_command(socket_path: &Path, command: &str) -> io::Result<String> {
    let mut stream = UnixStream::connect(socket_path)?;

    let mut message = String::with_capacity(command.len() + 1);
    message.push_str(command);
    message.push('\n');
    stream.write_all(message.as_bytes())?;
    stream.flush()?;

    let mut response = Vec::new();
    let mut buf = [0u8; 128];
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        response.extend_from_slice(&buf[..n]);
        if response.contains(&b'\n') {
            break;
        }
    }

    let response = String::from_utf8_lossy(&response);
    Ok(response.lines().next().unwrap_or_default().to_string())
}
