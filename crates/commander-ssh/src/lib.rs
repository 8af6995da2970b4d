//! # Commander SSH Transport
//!
//! One authenticated SSH session per host, built on libssh2. The transport
//! knows nothing about host lists or dispatching; it connects, runs commands
//! and disconnects.

#![warn(missing_docs)]

/// Transport abstraction and the libssh2 implementation
pub mod transport;

/// An established session to a single host
pub mod connection;

/// Identity file lookup
pub mod keys;

/// Transport error types
pub mod error;

pub use connection::{CommandOutput, Connection};
pub use error::SessionError;
pub use keys::resolve_identity_file;
pub use transport::{ConnectionInfo, Ssh2Transport, SshConfig, Transport};
