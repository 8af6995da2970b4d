//! Concurrent fan-out over the host list
//!
//! One task per host, all submitted up front. The pool width defaults to the
//! host count and can be capped. Failures, deadlines and panics are contained
//! in the unit that raised them and come back as [`HostReport`]s.

use crate::{CommandList, HostAddress, HostList, SessionConfig, SessionOutput, SessionRunner};
use commander_ssh::SessionError;
use futures::FutureExt;
use std::any::Any;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, Instrument};

/// Limits applied to a dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchLimits {
    /// Upper bound on concurrently running units; one per host when `None`
    pub max_parallel: Option<NonZeroUsize>,
    /// Deadline for a whole unit; no deadline when `None`
    pub session_timeout: Option<Duration>,
}

impl DispatchLimits {
    /// Number of units allowed to run at once for `hosts` hosts
    pub fn pool_width(&self, hosts: usize) -> usize {
        let width = match self.max_parallel {
            Some(cap) => cap.get().min(hosts),
            None => hosts,
        };
        width.max(1)
    }
}

/// How one host's unit ended
#[derive(Debug)]
pub enum HostOutcome {
    /// Every command ran and exited 0
    Succeeded(SessionOutput),
    /// The session failed
    Failed(SessionError),
}

impl HostOutcome {
    /// Whether the unit succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&SessionError> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(err) => Some(err),
        }
    }
}

impl From<Result<SessionOutput, SessionError>> for HostOutcome {
    fn from(result: Result<SessionOutput, SessionError>) -> Self {
        match result {
            Ok(output) => Self::Succeeded(output),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Result record of one dispatch unit
#[derive(Debug)]
pub struct HostReport {
    /// Position of the host in the host list
    pub index: usize,
    /// The host
    pub host: HostAddress,
    /// How the unit ended
    pub outcome: HostOutcome,
    /// Wall time spent in the session, excluding time queued for a slot
    pub elapsed: Duration,
}

/// Reports of every unit, in completion order
#[derive(Debug, Default)]
pub struct DispatchSummary {
    reports: Vec<HostReport>,
}

impl DispatchSummary {
    /// All reports in completion order
    pub fn reports(&self) -> &[HostReport] {
        &self.reports
    }

    /// Number of completed units
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether no unit ran
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Number of hosts that succeeded
    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    /// Number of hosts that failed
    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Failed hosts with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&HostAddress, &SessionError)> {
        self.reports
            .iter()
            .filter_map(|r| r.outcome.error().map(|err| (&r.host, err)))
    }
}

/// Runs a [`SessionRunner`] once per host, concurrently
#[derive(Clone)]
pub struct Dispatcher {
    runner: Arc<dyn SessionRunner>,
    limits: DispatchLimits,
}

impl Dispatcher {
    /// Create a dispatcher with no cap and no deadline
    pub fn new(runner: Arc<dyn SessionRunner>) -> Self {
        Self {
            runner,
            limits: DispatchLimits::default(),
        }
    }

    /// Apply concurrency and deadline limits
    pub fn with_limits(mut self, limits: DispatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Run `commands` on every host and wait for all of them.
    ///
    /// Returns once every unit has finished. Per-host failures never escape;
    /// they are logged against their host and returned in the summary.
    pub async fn dispatch(
        &self,
        hosts: HostList,
        config: Arc<SessionConfig>,
        commands: Arc<CommandList>,
    ) -> DispatchSummary {
        let total = hosts.len();
        let width = self.limits.pool_width(total);
        debug!("Dispatching {} hosts with pool width {}", total, width);

        let slots = Arc::new(Semaphore::new(width));
        let mut units = JoinSet::new();

        for (index, host) in hosts.into_iter().enumerate() {
            let span = info_span!("session", host = %host);
            let unit = Unit {
                index,
                host,
                runner: Arc::clone(&self.runner),
                config: Arc::clone(&config),
                commands: Arc::clone(&commands),
                deadline: self.limits.session_timeout,
            };
            let slots = Arc::clone(&slots);

            units.spawn(
                async move {
                    // The semaphore is never closed, so acquiring cannot fail.
                    let _slot = slots.acquire_owned().await.ok();
                    unit.run().await
                }
                .instrument(span),
            );
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("Dispatch unit aborted: {}", e),
            }
        }

        DispatchSummary { reports }
    }
}

/// One host's share of a dispatch
struct Unit {
    index: usize,
    host: HostAddress,
    runner: Arc<dyn SessionRunner>,
    config: Arc<SessionConfig>,
    commands: Arc<CommandList>,
    deadline: Option<Duration>,
}

impl Unit {
    async fn run(self) -> HostReport {
        let started = Instant::now();
        let result = self.run_contained().await;
        let elapsed = started.elapsed();

        match &result {
            Ok(output) => info!(
                commands = output.commands.len(),
                "Session finished in {:.2?}", elapsed
            ),
            Err(err) => error!(kind = err.kind(), "Session failed: {}", err),
        }

        HostReport {
            index: self.index,
            host: self.host,
            outcome: result.into(),
            elapsed,
        }
    }

    /// Run the session with the deadline applied and panics caught
    async fn run_contained(&self) -> Result<SessionOutput, SessionError> {
        let session = AssertUnwindSafe(self.runner.run_session(
            &self.host,
            &self.config,
            &self.commands,
        ))
        .catch_unwind();

        let caught = match self.deadline {
            Some(limit) => match tokio::time::timeout(limit, session).await {
                Ok(caught) => caught,
                Err(_) => Ok(Err(SessionError::Timeout)),
            },
            None => session.await,
        };

        caught.unwrap_or_else(|panic| Err(SessionError::Panicked(panic_message(panic.as_ref()))))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
