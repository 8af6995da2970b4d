//! # Commander
//!
//! Run a list of shell commands on many hosts at once, one SSH session per
//! host. A failing host never stops the others; every outcome is logged and
//! returned in a [`DispatchSummary`].

#![warn(missing_docs)]

pub use commander_ssh as ssh;

/// Error types for the Commander library
pub mod error;

/// Host file loading and validation
pub mod hosts;

/// Session configuration shared by every host
pub mod session;

/// Per-host session runner
pub mod runner;

/// Concurrent fan-out over the host list
pub mod dispatch;

pub use dispatch::{DispatchLimits, DispatchSummary, Dispatcher, HostOutcome, HostReport};
pub use error::CommanderError;
pub use hosts::{load_hosts, HostAddress, HostList, RejectedLine};
pub use runner::{SessionOutput, SessionRunner, SshSessionRunner};
pub use session::{CommandList, SessionConfig, SessionConfigBuilder};

/// Result type alias for Commander operations
pub type Result<T> = std::result::Result<T, CommanderError>;
