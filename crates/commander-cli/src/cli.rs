//! Command line arguments

use clap::{Arg, ArgAction, CommandFactory, FromArgMatches, Parser};
use commander::{DispatchLimits, SessionConfig};
use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Execute commands on several remote hosts, with SSH.
#[derive(Debug, Parser)]
#[command(name = "ssh-commander", version)]
pub struct Cli {
    /// Plain text file with list of hosts
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// User to login on remote hosts
    #[arg(value_name = "USER")]
    pub user: String,

    /// Comma separated commands to be executed on remote hosts
    #[arg(value_name = "COMMANDS")]
    pub commands: String,

    /// Specify SSH port to connect to hosts
    #[arg(short, long, default_value_t = 22)]
    pub port: u16,

    /// Public key auth file
    #[arg(short, long = "identity_file", value_name = "IDENTITY_FILE")]
    pub identity_file: Option<PathBuf>,

    /// Maximum number of hosts handled at once (0 = all hosts at once)
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub max_parallel: usize,

    /// TCP connect timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub connect_timeout: u64,

    /// Per-host session deadline in seconds (0 = no deadline)
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    pub timeout: u64,
}

impl Cli {
    /// The clap command with `-v/--version` in place of clap's `-V`
    pub fn command_with_version() -> clap::Command {
        Self::command().disable_version_flag(true).arg(
            Arg::new("version")
                .short('v')
                .long("version")
                .action(ArgAction::Version)
                .help("Show current version"),
        )
    }

    /// Parse arguments, returning clap's error for help, version and usage
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut matches = Self::command_with_version().try_get_matches_from(args)?;
        Self::from_arg_matches_mut(&mut matches)
    }

    /// Concurrency cap and deadline for the dispatcher
    pub fn dispatch_limits(&self) -> DispatchLimits {
        DispatchLimits {
            max_parallel: NonZeroUsize::new(self.max_parallel),
            session_timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
        }
    }
}

/// Fold the parsed options into the configuration shared by every host
pub fn build_session_config(cli: &Cli) -> commander::Result<SessionConfig> {
    let mut builder = SessionConfig::builder(cli.user.as_str(), cli.commands.as_str())
        .with_port(cli.port)
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout));

    if let Some(identity_file) = &cli.identity_file {
        builder = builder.with_identity_file(identity_file);
    }
    if cli.timeout > 0 {
        builder = builder.with_command_timeout(Duration::from_secs(cli.timeout));
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_args(std::iter::once("ssh-commander").chain(args.iter().copied()))
    }

    #[test]
    fn test_positional_arguments() {
        let cli = parse(&["hosts.txt", "ops", "uptime,df -h"]).unwrap();

        assert_eq!(cli.file, PathBuf::from("hosts.txt"));
        assert_eq!(cli.user, "ops");
        assert_eq!(cli.commands, "uptime,df -h");
        assert_eq!(cli.port, 22);
        assert!(cli.identity_file.is_none());
        assert_eq!(cli.max_parallel, 0);
        assert_eq!(cli.timeout, 0);
    }

    #[test]
    fn test_port_and_identity_file() {
        let cli = parse(&["hosts.txt", "ops", "uptime", "-p", "2222", "-i", "id_ed25519"]).unwrap();
        assert_eq!(cli.port, 2222);
        assert_eq!(cli.identity_file, Some(PathBuf::from("id_ed25519")));

        let cli = parse(&["hosts.txt", "ops", "uptime", "--port", "2200", "--identity_file", "/k"]).unwrap();
        assert_eq!(cli.port, 2200);
        assert_eq!(cli.identity_file, Some(PathBuf::from("/k")));
    }

    #[test]
    fn test_version_flag() {
        let err = parse(&["-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        let err = parse(&["--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_missing_commands_is_usage_error() {
        let err = parse(&["hosts.txt", "ops"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(parse(&["hosts.txt", "ops", "uptime", "-p", "70000"]).is_err());
        assert!(parse(&["hosts.txt", "ops", "uptime", "-p", "ssh"]).is_err());
    }

    #[test]
    fn test_build_session_config() {
        let cli = parse(&[
            "hosts.txt", "deploy", "uptime, whoami", "-p", "2222", "-i", "/keys/id", "--timeout", "90",
        ])
        .unwrap();
        let config = build_session_config(&cli).unwrap();

        assert_eq!(config.username(), "deploy");
        assert_eq!(config.port(), 2222);
        assert_eq!(config.identity_file(), Some(&PathBuf::from("/keys/id")));
        assert_eq!(config.commands().len(), 2);
        assert_eq!(config.command_timeout(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_build_session_config_rejects_empty_commands() {
        let cli = parse(&["hosts.txt", "ops", ","]).unwrap();
        assert!(build_session_config(&cli).is_err());
    }

    #[test]
    fn test_dispatch_limits() {
        let cli = parse(&["hosts.txt", "ops", "uptime"]).unwrap();
        assert_eq!(cli.dispatch_limits(), DispatchLimits::default());

        let cli = parse(&["hosts.txt", "ops", "uptime", "--max-parallel", "16", "--timeout", "5"]).unwrap();
        let limits = cli.dispatch_limits();
        assert_eq!(limits.max_parallel, NonZeroUsize::new(16));
        assert_eq!(limits.session_timeout, Some(Duration::from_secs(5)));
    }
}
