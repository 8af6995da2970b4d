//! An established session to a single host

use crate::{ConnectionInfo, SessionError};
use ssh2::Session;
use std::io::{self, Read};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Pause between polls while both output streams are idle
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output of one remote command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// The command as sent to the host
    pub command: String,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Remote exit status
    pub exit_status: i32,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Authenticated SSH session owned by exactly one dispatch unit.
///
/// The session is disconnected by [`Connection::close`] or, failing that,
/// when the connection is dropped.
pub struct Connection {
    session: Option<Session>,
    info: ConnectionInfo,
}

impl Connection {
    /// Wrap an authenticated session
    pub fn new(session: Session, info: ConnectionInfo) -> Self {
        Self {
            session: Some(session),
            info,
        }
    }

    #[cfg(test)]
    pub(crate) fn detached(info: ConnectionInfo) -> Self {
        Self { session: None, info }
    }

    /// Check if the session is still open
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Host, port and user of this session
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Run one command on a fresh exec channel and collect its output
    pub async fn exec(&self, command: &str) -> Result<CommandOutput, SessionError> {
        let session = self
            .session
            .clone()
            .ok_or_else(|| SessionError::Connection("session is closed".to_string()))?;
        let command = command.to_string();

        debug!("Executing remote command: {}", command);

        tokio::task::spawn_blocking(move || exec_blocking(&session, command))
            .await
            .map_err(|e| SessionError::Panicked(e.to_string()))?
    }

    /// Disconnect the session
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(session) = self.session.take() {
            debug!("Closing SSH session to {}", self.info.host);
            tokio::task::spawn_blocking(move || disconnect(&session))
                .await
                .map_err(|e| SessionError::Panicked(e.to_string()))?;
        }
        Ok(())
    }
}

fn exec_blocking(session: &Session, command: String) -> Result<CommandOutput, SessionError> {
    let mut channel = session.channel_session()?;
    channel.exec(&command)?;

    let deadline = match session.timeout() {
        0 => None,
        millis => Some(Duration::from_millis(u64::from(millis))),
    };

    // Non-blocking while draining so a full stderr window cannot stall stdout.
    session.set_blocking(false);
    let collected = {
        let mut stdout = channel.stream(0);
        let mut stderr = channel.stderr();
        collect_streams(&mut stdout, &mut stderr, || channel.eof(), deadline)
    };
    session.set_blocking(true);
    let (stdout, stderr) = collected?;

    channel.wait_close()?;
    let exit_status = channel.exit_status()?;

    Ok(CommandOutput {
        command,
        stdout: decode_output(stdout),
        stderr: decode_output(stderr),
        exit_status,
    })
}

/// Read stdout and stderr side by side until `is_eof` reports the remote end
/// closed, then take whatever is left.
fn collect_streams<O: Read, E: Read>(
    stdout: &mut O,
    stderr: &mut E,
    is_eof: impl Fn() -> bool,
    deadline: Option<Duration>,
) -> Result<(Vec<u8>, Vec<u8>), SessionError> {
    let started = Instant::now();
    let mut out = Vec::new();
    let mut err = Vec::new();

    loop {
        let eof = is_eof();
        let read = read_available(stdout, &mut out)? + read_available(stderr, &mut err)?;
        if eof {
            return Ok((out, err));
        }
        if read == 0 {
            if deadline.is_some_and(|limit| started.elapsed() >= limit) {
                return Err(SessionError::Timeout);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

/// Append everything readable right now, returning the number of bytes read
fn read_available<R: Read>(stream: &mut R, buf: &mut Vec<u8>) -> Result<usize, SessionError> {
    let mut chunk = [0u8; 8192];
    let mut total = 0;
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => return Ok(total),
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(total),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Remote output as text; invalid UTF-8 is replaced, not rejected
fn decode_output(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn disconnect(session: &Session) {
    if let Err(e) = session.disconnect(None, "ssh-commander session finished", None) {
        warn!("Failed to disconnect SSH session: {}", e);
    }
}

/// Run blocking cleanup on the blocking pool when inside a runtime, inline
/// otherwise. Keeps async workers free while libssh2 holds the session lock.
fn run_off_worker<F>(task: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(task);
        }
        Err(_) => task(),
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            run_off_worker(move || disconnect(&session));
        }
    }
}
