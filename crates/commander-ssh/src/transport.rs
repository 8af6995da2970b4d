//! Transport abstraction and the libssh2 implementation

use crate::{keys, Connection, SessionError};
use async_trait::async_trait;
use ssh2::Session;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Transport abstraction for opening a session to one host
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect and authenticate to the remote host
    async fn connect(&mut self) -> Result<Connection, SessionError>;

    /// Get connection information
    fn connection_info(&self) -> ConnectionInfo;
}

/// Connection information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Remote IP
    pub host: String,
    /// Remote port
    pub port: u16,
    /// Username
    pub username: String,
}

/// SSH configuration for a single host
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote hostname or IP
    pub host: String,
    /// Remote port (default: 22)
    pub port: u16,
    /// Username
    pub username: String,
    /// Private key for public-key authentication; agent auth when unset
    pub key_path: Option<PathBuf>,
    /// TCP connect timeout in seconds
    pub connect_timeout: u64,
    /// Timeout for each blocking libssh2 call in seconds, 0 disables it
    pub command_timeout: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 22,
            username: "root".to_string(),
            key_path: None,
            connect_timeout: 30,
            command_timeout: 0,
        }
    }
}

/// Transport backed by a libssh2 session over a plain TCP socket
pub struct Ssh2Transport {
    config: SshConfig,
}

impl Ssh2Transport {
    /// Create a new transport
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    fn open_session(config: &SshConfig) -> Result<Session, SessionError> {
        let addr = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| SessionError::Connection(format!("{}: {}", config.host, e)))?
            .next()
            .ok_or_else(|| {
                SessionError::Connection(format!("{}: no address to connect to", config.host))
            })?;

        let connect_timeout = Duration::from_secs(config.connect_timeout.max(1));
        let tcp = TcpStream::connect_timeout(&addr, connect_timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                SessionError::Timeout
            } else {
                SessionError::Connection(format!("{}: {}", addr, e))
            }
        })?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        if config.command_timeout > 0 {
            let millis = config.command_timeout.saturating_mul(1000);
            session.set_timeout(u32::try_from(millis).unwrap_or(u32::MAX));
        }
        session
            .handshake()
            .map_err(|e| match SessionError::from(e) {
                SessionError::Ssh(e) => SessionError::Connection(format!("handshake failed: {}", e)),
                other => other,
            })?;

        Self::authenticate(&session, config)?;
        Ok(session)
    }

    fn authenticate(session: &Session, config: &SshConfig) -> Result<(), SessionError> {
        let attempt = match &config.key_path {
            Some(key_path) => {
                let key = keys::resolve_identity_file(key_path)?;
                debug!("Trying public key {} for {}", key.display(), config.username);
                session.userauth_pubkey_file(&config.username, None, &key, None)
            }
            None => {
                debug!("Trying ssh-agent authentication for {}", config.username);
                session.userauth_agent(&config.username)
            }
        };

        match attempt {
            Ok(()) if session.authenticated() => Ok(()),
            Ok(()) => Err(SessionError::Authentication(format!(
                "{}@{} not authenticated",
                config.username, config.host
            ))),
            Err(e) => match SessionError::from(e) {
                SessionError::Ssh(e) => Err(SessionError::Authentication(e.to_string())),
                other => Err(other),
            },
        }
    }
}

#[async_trait]
impl Transport for Ssh2Transport {
    async fn connect(&mut self) -> Result<Connection, SessionError> {
        info!("Connecting to {}@{}:{}", self.config.username, self.config.host, self.config.port);

        let config = self.config.clone();
        let session = tokio::task::spawn_blocking(move || Self::open_session(&config))
            .await
            .map_err(|e| SessionError::Panicked(e.to_string()))??;

        debug!("Authenticated to {}@{}", self.config.username, self.config.host);
        Ok(Connection::new(session, self.connection_info()))
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            host: self.config.host.clone(),
            port: self.config.port,
            username: self.config.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_ssh_config_default() {
        let config = SshConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 22);
        assert_eq!(config.username, "root");
        assert_eq!(config.connect_timeout, 30);
        assert_eq!(config.command_timeout, 0);
        assert!(config.key_path.is_none());
    }

    #[test]
    fn test_connection_info() {
        let config = SshConfig {
            host: "192.168.1.20".to_string(),
            port: 2222,
            username: "deploy".to_string(),
            ..Default::default()
        };

        let transport = Ssh2Transport::new(config);
        let info = transport.connection_info();

        assert_eq!(info.host, "192.168.1.20");
        assert_eq!(info.port, 2222);
        assert_eq!(info.username, "deploy");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connection_error() {
        // Bind then drop to get a local port with nothing listening on it.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut transport = Ssh2Transport::new(SshConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout: 2,
            ..Default::default()
        });

        let err = transport.connect().await.err().unwrap();
        assert!(matches!(err, SessionError::Connection(_)), "unexpected error: {err}");
    }
}
