//! Unix socket command listener
//!
//! A dedicated service thread accepts one client at a time, reads a single
//! newline-terminated command, writes one reply line and closes the
//! connection. `stop()` shuts the listening socket down to wake the thread
//! out of `accept`, and does the same to an in-flight client that never sent
//! its line.

use std::fs;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::command;
use crate::driver::LedDriver;
use crate::error::ListenerError;

/// Well-known control socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/openskydimo.sock";

/// Longest command line accepted, newline included
const MAX_COMMAND_LEN: usize = 1024;

/// Owns the control socket and its service thread
pub struct CommandListener {
    socket_path: PathBuf,
    driver: Arc<LedDriver>,
    running: Arc<AtomicBool>,
    socket: Option<Arc<UnixListener>>,
    client: Arc<Mutex<Option<UnixStream>>>,
    thread: Option<JoinHandle<()>>,
}

impl CommandListener {
    pub fn new(socket_path: impl Into<PathBuf>, driver: Arc<LedDriver>) -> Self {
        Self {
            socket_path: socket_path.into(),
            driver,
            running: Arc::new(AtomicBool::new(false)),
            socket: None,
            client: Arc::new(Mutex::new(None)),
            thread: None,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket and spawn the service thread. No-op if already running.
    ///
    /// On failure the listener stays stopped; the error has already been
    /// logged.
    pub fn start(&mut self) -> Result<(), ListenerError> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        // Reclaim the socket of a service thread that died on its own
        self.stop();

        let socket = match bind_socket(&self.socket_path) {
            Ok(socket) => Arc::new(socket),
            Err(source) => {
                let err = ListenerError::Bind {
                    path: self.socket_path.clone(),
                    source,
                };
                error!("{err}");
                return Err(err);
            }
        };

        self.running.store(true, Ordering::SeqCst);
        let service = ServiceLoop {
            socket: Arc::clone(&socket),
            driver: Arc::clone(&self.driver),
            running: Arc::clone(&self.running),
            client: Arc::clone(&self.client),
        };

        let handle = std::thread::Builder::new()
            .name("skydimo-listener".into())
            .spawn(move || service.run());

        match handle {
            Ok(handle) => {
                info!("Socket listening on {}", self.socket_path.display());
                self.socket = Some(socket);
                self.thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                drop(socket);
                remove_socket_file(&self.socket_path);
                let err = ListenerError::Spawn(e);
                error!("{err}");
                Err(err)
            }
        }
    }

    /// Stop serving, join the thread and unlink the socket. Safe to call
    /// repeatedly.
    pub fn stop(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);

        // Wakes the service thread out of accept(); it then sees !running
        shutdown_socket(&socket);
        if let Some(client) = self.client.lock().as_ref() {
            let _ = client.shutdown(Shutdown::Both);
        }

        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("Listener thread panicked");
            }
        }

        drop(socket);
        remove_socket_file(&self.socket_path);
        info!("Listener on {} stopped", self.socket_path.display());
    }

    /// True once the listener is not (or no longer) serving
    pub fn should_stop(&self) -> bool {
        !self.running.load(Ordering::SeqCst)
    }

    /// Run one command line against the driver, returning the reply line
    pub fn execute_command(&self, line: &str) -> String {
        command::handle_line(&self.driver, line)
    }

    /// Handle that makes the service thread exit as it does after a fatal
    /// accept error, leaving the socket for `stop()` to reclaim.
    #[cfg(test)]
    pub(crate) fn service_fault(&self) -> Option<ServiceFault> {
        self.socket.as_ref().map(|socket| ServiceFault {
            running: Arc::clone(&self.running),
            socket: Arc::clone(socket),
        })
    }
}

#[cfg(test)]
pub(crate) struct ServiceFault {
    running: Arc<AtomicBool>,
    socket: Arc<UnixListener>,
}

#[cfg(test)]
impl ServiceFault {
    pub(crate) fn trigger(&self) {
        self.running.store(false, Ordering::SeqCst);
        shutdown_socket(&self.socket);
    }
}

impl Drop for CommandListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the service thread
struct ServiceLoop {
    socket: Arc<UnixListener>,
    driver: Arc<LedDriver>,
    running: Arc<AtomicBool>,
    client: Arc<Mutex<Option<UnixStream>>>,
}

impl ServiceLoop {
    fn run(self) {
        while self.running.load(Ordering::SeqCst) {
            match self.socket.accept() {
                Ok((stream, _)) => self.serve(stream),
                Err(_) if !self.running.load(Ordering::SeqCst) => break,
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    debug!("accept interrupted: {e}");
                }
                Err(e) => {
                    error!("Error accepting client connection: {e}");
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        }
        debug!("Listener thread exiting");
    }

    fn serve(&self, mut stream: UnixStream) {
        match stream.try_clone() {
            Ok(handle) => *self.client.lock() = Some(handle),
            Err(e) => warn!("Cannot track client connection: {e}"),
        }
        // stop() may have run between accept() and the line above
        if !self.running.load(Ordering::SeqCst) {
            self.client.lock().take();
            return;
        }

        match read_command(&mut stream) {
            Ok(Some(line)) => {
                let reply = command::handle_line(&self.driver, &line);
                if let Err(e) = stream.write_all(reply.as_bytes()) {
                    warn!("Failed to send reply: {e}");
                }
            }
            Ok(None) => debug!("Client disconnected without a command"),
            Err(e) => warn!("Failed to read from client: {e}"),
        }

        self.client.lock().take();
    }
}

/// Read until the first newline, EOF or `MAX_COMMAND_LEN` bytes.
///
/// Returns `None` when the client sent nothing at all.
fn read_command(stream: &mut UnixStream) -> io::Result<Option<String>> {
    let mut buf = Vec::with_capacity(MAX_COMMAND_LEN);
    let mut chunk = [0u8; MAX_COMMAND_LEN];

    while buf.len() < MAX_COMMAND_LEN && !buf.contains(&b'\n') {
        let n = stream.read(&mut chunk[..MAX_COMMAND_LEN - buf.len()])?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    if buf.is_empty() {
        return Ok(None);
    }

    let end = buf.iter().position(|&b| b == b'\n').unwrap_or(buf.len());
    let line = String::from_utf8_lossy(&buf[..end]);
    Ok(Some(line.trim_end_matches('\r').to_string()))
}

/// Bind `path`, replacing a socket file left behind by a crashed daemon.
fn bind_socket(path: &Path) -> io::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    match UnixListener::bind(path) {
        Ok(socket) => Ok(socket),
        Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
            let is_socket = fs::symlink_metadata(path)
                .map(|m| m.file_type().is_socket())
                .unwrap_or(false);
            if !is_socket {
                return Err(e);
            }
            if UnixStream::connect(path).is_ok() {
                return Err(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    format!("daemon already running at {}", path.display()),
                ));
            }

            warn!("Removing stale socket {}", path.display());
            fs::remove_file(path)?;
            UnixListener::bind(path)
        }
        Err(e) => Err(e),
    }
}

fn shutdown_socket(socket: &UnixListener) {
    if unsafe { libc::shutdown(socket.as_raw_fd(), libc::SHUT_RDWR) } != 0 {
        debug!(
            "shutdown on listening socket: {}",
            io::Error::last_os_error()
        );
    }
}

fn remove_socket_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::send_command;
    use crate::driver::mock::mock_driver;
    use std::time::{Duration, Instant};

    fn temp_socket_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "skydimo-listener-{label}-{}.sock",
            std::process::id()
        ))
    }

    fn started_listener(label: &str) -> CommandListener {
        let (driver, _) = mock_driver();
        let mut listener = CommandListener::new(temp_socket_path(label), Arc::new(driver));
        listener.start().expect("listener should start");
        listener
    }

    #[test]
    fn test_start_and_serve() {
        let mut listener = started_listener("serve");
        assert!(!listener.should_stop());
        assert!(listener.socket_path().exists());

        let reply = send_command(listener.socket_path(), "set count 10").unwrap();
        assert_eq!(reply, "OK");
        let reply = send_command(listener.socket_path(), "fill 256 0 0").unwrap();
        assert!(reply.starts_with("ERROR: "), "{reply}");

        listener.stop();
    }

    #[test]
    fn test_start_twice_is_noop() {
        let mut listener = started_listener("start-twice");
        listener.start().unwrap();
        assert_eq!(
            send_command(listener.socket_path(), "status").unwrap(),
            "OK port=- count=0 baud=115200 connected=false ready=false"
        );
        listener.stop();
    }

    #[test]
    fn test_silent_client_gets_no_reply() {
        let mut listener = started_listener("silent");

        // connect and hang up without sending anything
        drop(UnixStream::connect(listener.socket_path()).unwrap());

        let mut stream = UnixStream::connect(listener.socket_path()).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "");

        // still serving
        assert_eq!(send_command(listener.socket_path(), "stop").unwrap(), "OK");
        listener.stop();
    }

    #[test]
    fn test_line_without_newline_is_served_at_eof() {
        let mut listener = started_listener("no-newline");
        let mut stream = UnixStream::connect(listener.socket_path()).unwrap();
        stream.write_all(b"set count 3").unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).unwrap();
        assert_eq!(reply, "OK\n");
        listener.stop();
    }

    #[test]
    fn test_stop_twice_removes_socket() {
        let mut listener = started_listener("stop-twice");
        let path = listener.socket_path().to_path_buf();
        listener.stop();
        assert!(listener.should_stop());
        assert!(!path.exists());
        listener.stop();
        assert!(!path.exists());
    }

    #[test]
    fn test_stop_unblocks_stalled_client() {
        let mut listener = started_listener("stalled");
        let _client = UnixStream::connect(listener.socket_path()).unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        listener.stop();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(listener.should_stop());
    }

    #[test]
    fn test_restart_after_service_thread_died() {
        let mut listener = started_listener("restart");
        let fault = listener.service_fault().expect("listener is bound");
        fault.trigger();
        assert!(listener.should_stop());

        listener.start().unwrap();
        assert!(!listener.should_stop());
        assert_eq!(send_command(listener.socket_path(), "stop").unwrap(), "OK");
        listener.stop();
        assert!(!listener.socket_path().exists());
    }

    #[test]
    fn test_bind_failure_leaves_listener_stopped() {
        let (driver, _) = mock_driver();
        let mut listener =
            CommandListener::new("/dev/null/skydimo/ctl.sock", Arc::new(driver));
        assert!(matches!(listener.start(), Err(ListenerError::Bind { .. })));
        assert!(listener.should_stop());
        listener.stop();
    }

    #[test]
    fn test_replaces_stale_socket() {
        let path = temp_socket_path("stale");
        let _ = fs::remove_file(&path);
        drop(UnixListener::bind(&path).unwrap());
        assert!(path.exists());

        let (driver, _) = mock_driver();
        let mut listener = CommandListener::new(&path, Arc::new(driver));
        listener.start().unwrap();
        assert_eq!(send_command(&path, "stop").unwrap(), "OK");
        listener.stop();
    }

    #[test]
    fn test_refuses_live_socket() {
        let mut first = started_listener("live");
        let (driver, _) = mock_driver();
        let mut second = CommandListener::new(first.socket_path(), Arc::new(driver));
        assert!(second.start().is_err());
        drop(second);

        // the first daemon is untouched
        assert!(first.socket_path().exists());
        assert_eq!(send_command(first.socket_path(), "stop").unwrap(), "OK");
        first.stop();
    }

    #[test]
    fn test_execute_command_appends_newline() {
        let (driver, _) = mock_driver();
        let listener = CommandListener::new(temp_socket_path("exec"), Arc::new(driver));
        assert_eq!(listener.execute_command("stop"), "OK\n");
        assert!(listener.execute_command("bogus").ends_with('\n'));
    }
}
