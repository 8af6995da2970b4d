//! Per-host session runner

use crate::{CommandList, HostAddress, SessionConfig};
use async_trait::async_trait;
use commander_ssh::{CommandOutput, Connection, SessionError, Ssh2Transport, Transport};
use tracing::{info, warn};

/// Everything one host produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutput {
    /// Host the commands ran on
    pub host: HostAddress,
    /// One entry per command, in order
    pub commands: Vec<CommandOutput>,
}

/// Opens one session to a host, runs the command list and closes it
#[async_trait]
pub trait SessionRunner: Send + Sync {
    /// Run `commands` on `host`
    async fn run_session(
        &self,
        host: &HostAddress,
        config: &SessionConfig,
        commands: &CommandList,
    ) -> Result<SessionOutput, SessionError>;
}

/// [`SessionRunner`] over a libssh2 session
#[derive(Debug, Clone, Copy, Default)]
pub struct SshSessionRunner;

#[async_trait]
impl SessionRunner for SshSessionRunner {
    async fn run_session(
        &self,
        host: &HostAddress,
        config: &SessionConfig,
        commands: &CommandList,
    ) -> Result<SessionOutput, SessionError> {
        let mut transport = Ssh2Transport::new(config.ssh_config(host));
        let mut connection = transport.connect().await?;

        let result = run_commands(&connection, commands).await;

        if let Err(e) = connection.close().await {
            warn!("Error closing session: {}", e);
        }

        result.map(|outputs| SessionOutput {
            host: host.clone(),
            commands: outputs,
        })
    }
}

/// Run every command, then fail with the first non-zero exit if any
async fn run_commands(
    connection: &Connection,
    commands: &CommandList,
) -> Result<Vec<CommandOutput>, SessionError> {
    let mut outputs = Vec::with_capacity(commands.len());
    let mut first_failure = None;

    for command in commands.iter() {
        let output = connection.exec(command).await?;
        log_output(&output);

        if !output.success() && first_failure.is_none() {
            first_failure = Some(SessionError::CommandFailed {
                command: output.command.clone(),
                code: output.exit_status,
            });
        }
        outputs.push(output);
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}

fn log_output(output: &CommandOutput) {
    for line in output.stdout.lines() {
        info!(command = %output.command, "{}", line);
    }
    for line in output.stderr.lines() {
        warn!(command = %output.command, "{}", line);
    }
}
