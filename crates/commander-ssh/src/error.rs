//! Transport error types

use std::io;
use thiserror::Error;

/// libssh2's `LIBSSH2_ERROR_TIMEOUT`
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Errors raised while running a session against one host
#[derive(Debug, Error)]
pub enum SessionError {
    /// TCP connect or SSH handshake failed
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// The server rejected every offered credential
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A remote command exited with a non-zero status
    #[error("Remote command `{command}` failed with exit code {code}")]
    CommandFailed {
        /// The command as sent to the host
        command: String,
        /// Exit status reported by the remote side
        code: i32,
    },

    /// I/O error on the underlying socket or channel
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Any other libssh2 error
    #[error("SSH error: {0}")]
    Ssh(ssh2::Error),

    /// The session or one of its calls exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// Invalid session settings, e.g. a missing identity file
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The unit running this session panicked
    #[error("Session task panicked: {0}")]
    Panicked(String),
}

impl SessionError {
    /// Short stable label for log fields and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Authentication(_) => "authentication",
            Self::CommandFailed { .. } => "command",
            Self::Io(_) => "io",
            Self::Ssh(_) => "ssh",
            Self::Timeout => "timeout",
            Self::Configuration(_) => "configuration",
            Self::Panicked(_) => "panic",
        }
    }
}

impl From<ssh2::Error> for SessionError {
    fn from(err: ssh2::Error) -> Self {
        match err.code() {
            ssh2::ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT) => Self::Timeout,
            _ => Self::Ssh(err),
        }
    }
}
