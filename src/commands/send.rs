//! Client side of the control socket.

use anyhow::{bail, Context, Result};
use std::path::Path;

use skydimo::client::send_command;
use skydimo::command::{is_error_reply, DriverCommand};

/// Send one command to the daemon and print its reply
pub fn send(socket_path: &Path, command: &DriverCommand) -> Result<()> {
    let line = command.to_string();
    let reply = send_command(socket_path, &line).with_context(|| {
        format!(
            "Cannot reach daemon at {} (is the daemon running?)",
            socket_path.display()
        )
    })?;

    if reply.is_empty() {
        bail!("Daemon closed the connection without replying");
    }

    println!("[SERVER] - {reply}");
    if is_error_reply(&reply) {
        bail!("Command '{line}' failed");
    }
    Ok(())
}
