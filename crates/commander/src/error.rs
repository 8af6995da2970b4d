//! Error types for the Commander library

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal setup errors. Per-host failures are [`commander_ssh::SessionError`]
/// values carried in the dispatch summary and never surface here.
#[derive(Debug, Error)]
pub enum CommanderError {
    /// The host file could not be opened or read
    #[error("Cannot read host file {path}: {source}")]
    HostFile {
        /// Path given on the command line
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Every line of the host file was filtered out
    #[error("No valid hosts were found. Nothing to do!")]
    NoValidHosts,

    /// The operator interrupted the run
    #[error("Interrupted by user")]
    Interrupted,

    /// Invalid session settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}
