//! ssh-commander
//!
//! Execute comma separated commands on every host of a host file, one SSH
//! session per host, all hosts at once.

use commander::{load_hosts, CommanderError, Dispatcher, SshSessionRunner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod logging;

use cli::{build_session_config, Cli};

fn main() -> ExitCode {
    let cli = Cli::try_parse_args(std::env::args_os()).unwrap_or_else(|e| e.exit());

    if let Err(e) = logging::init_logging() {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = runtime.block_on(async {
        tokio::select! {
            result = run(cli) => result,
            Ok(()) = tokio::signal::ctrl_c() => Err(CommanderError::Interrupted),
        }
    });

    // Blocking libssh2 calls of interrupted or timed-out sessions may still be
    // running; they must not keep the process alive.
    runtime.shutdown_background();

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load hosts, build the shared config and dispatch. Only setup errors are
/// returned; per-host failures end up in the summary.
async fn run(cli: Cli) -> commander::Result<()> {
    let hosts = load_hosts(&cli.file)?;
    if hosts.is_empty() {
        return Err(CommanderError::NoValidHosts);
    }
    let config = build_session_config(&cli)?;
    let commands = Arc::new(config.commands());

    info!("[+] Setting up remote sessions with user: {}", config.username());

    let dispatcher = Dispatcher::new(Arc::new(SshSessionRunner)).with_limits(cli.dispatch_limits());
    let summary = dispatcher.dispatch(hosts, Arc::new(config), commands).await;

    info!(
        "Finished: {} succeeded, {} failed",
        summary.succeeded(),
        summary.failed()
    );
    Ok(())
}
