//! Session configuration shared by every host

use crate::{CommanderError, HostAddress, Result};
use commander_ssh::SshConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Commands to run on every host, in order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandList(Vec<String>);

impl CommandList {
    /// Split a comma separated command string. Pieces are trimmed and empty
    /// pieces dropped.
    pub fn parse(commands: &str) -> Self {
        Self(
            commands
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there is nothing to run
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the commands
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Settings shared read-only by every dispatch unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    username: String,
    port: u16,
    identity_file: Option<PathBuf>,
    command: String,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Start building a configuration for `username` running `command`
    pub fn builder(username: impl Into<String>, command: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(username, command)
    }

    /// Remote login name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// SSH port used for every host
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Private key for public-key auth; agent auth when `None`
    pub fn identity_file(&self) -> Option<&PathBuf> {
        self.identity_file.as_ref()
    }

    /// The raw comma separated command string
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The command string split into individual commands
    pub fn commands(&self) -> CommandList {
        CommandList::parse(&self.command)
    }

    /// TCP connect timeout
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Deadline applied to each blocking SSH call
    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// Transport settings for one host
    pub fn ssh_config(&self, host: &HostAddress) -> SshConfig {
        SshConfig {
            host: host.to_string(),
            port: self.port,
            username: self.username.clone(),
            key_path: self.identity_file.clone(),
            connect_timeout: self.connect_timeout.as_secs(),
            command_timeout: self.command_timeout.map_or(0, |t| t.as_secs().max(1)),
        }
    }
}

/// Builder for [`SessionConfig`]
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    username: String,
    command: String,
    port: u16,
    identity_file: Option<PathBuf>,
    connect_timeout: Duration,
    command_timeout: Option<Duration>,
}

impl SessionConfigBuilder {
    /// Create a builder with the default port and no identity file
    pub fn new(username: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            command: command.into(),
            port: DEFAULT_PORT,
            identity_file: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: None,
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use public-key auth with this key file
    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    /// Set the TCP connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bound every blocking SSH call by `timeout`
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SessionConfig> {
        if self.username.trim().is_empty() {
            return Err(CommanderError::Configuration("username must not be empty".to_string()));
        }
        if CommandList::parse(&self.command).is_empty() {
            return Err(CommanderError::Configuration(
                "no commands to execute".to_string(),
            ));
        }

        Ok(SessionConfig {
            username: self.username,
            port: self.port,
            identity_file: self.identity_file,
            command: self.command,
            connect_timeout: self.connect_timeout,
            command_timeout: self.command_timeout,
        })
    }
}
