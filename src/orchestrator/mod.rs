pub mod error;
pub mod launcher;
pub mod ports;
pub mod preflight;
pub mod ready;
pub mod reaper;
pub mod scanner;
pub mod service;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::platform::{self, SignalOutcome, Termination};
use crate::ui::summary::{print_conflicts, print_startup_summary};

use error::SupervisorError;
use launcher::{Launch, ServiceLauncher};
use ports::PortGuard;
use preflight::PreflightReport;
use reaper::ProcessReaper;
use scanner::ProcessScanner;
use service::{ServiceKind, SupervisorPlan};
use state::{ExitInfo, ServiceHandle, ServiceStatus, SupervisorState};

/// How long to wait for a child after SIGKILL before giving up on it.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// How long to wait for output readers of a stopped child.
const DRAIN_WAIT: Duration = Duration::from_millis(500);

/// Lower bound for the monitor poll period.
const MIN_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Cleaning,
    Launching,
    Monitoring,
    ShuttingDown,
}

/// Why the monitoring phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The operator asked to stop.
    Interrupted,
    /// A running child exited on its own.
    ServiceExited { kind: ServiceKind, exit: ExitInfo },
}

/// Owns the backend and frontend for one invocation and drives them
/// through cleaning, launching, monitoring and shutdown.
///
/// The cancellation token is the only way to interrupt it. Cancellation is
/// observed between steps, so an in-flight cleanup or launch finishes first.
pub struct Supervisor<L: Launch = ServiceLauncher> {
    plan: SupervisorPlan,
    launcher: L,
    scanner: ProcessScanner,
    guard: PortGuard,
    state: SupervisorState,
    phase: Phase,
    cancel: CancellationToken,
}

impl<L: Launch> Supervisor<L> {
    pub fn new(plan: SupervisorPlan, launcher: L) -> Self {
        Self {
            plan,
            launcher,
            scanner: ProcessScanner::new(),
            guard: PortGuard::new(),
            state: SupervisorState::new(),
            phase: Phase::Idle,
            cancel: CancellationToken::new(),
        }
    }

    /// Replace the process-table and port probes.
    pub fn with_probes(mut self, scanner: ProcessScanner, guard: PortGuard) -> Self {
        self.scanner = scanner;
        self.guard = guard;
        self
    }

    /// Token that, once cancelled, shuts the supervisor down.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn plan(&self) -> &SupervisorPlan {
        &self.plan
    }

    pub fn state(&self) -> &SupervisorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn set_phase(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "phase change");
        self.phase = phase;
    }

    /// Stop stale instances and free the service ports, then make sure
    /// nothing is left. Returns the number of termination actions.
    pub async fn clean(&mut self) -> Result<usize, SupervisorError> {
        self.set_phase(Phase::Cleaning);
        let ports = self.plan.ports();
        let reaper = ProcessReaper::new(
            &self.scanner,
            &self.guard,
            &self.plan.patterns,
            &ports,
            self.plan.settle,
        );

        let conflicts = reaper.conflicts();
        print_conflicts(&conflicts);
        let actions = reaper.cleanup().await;
        let residue = reaper.residue();
        self.set_phase(Phase::Idle);

        if residue.is_clean() {
            info!(actions, "cleanup complete");
            Ok(actions)
        } else {
            error!("cleanup incomplete");
            Err(SupervisorError::Conflict { residue })
        }
    }

    /// Run every environment check; fails with the whole itemized report.
    pub async fn check_environment(&self) -> Result<PreflightReport, SupervisorError> {
        let report = self.plan.preflight.run().await;
        if report.is_ok() {
            Ok(report)
        } else {
            let advice = self.plan.preflight.advice(&report);
            Err(SupervisorError::Environment { report, advice })
        }
    }

    /// Check the environment, then bring the services up in startup order.
    ///
    /// A failed backend aborts before the frontend is tried. A failed
    /// frontend shuts the running backend down before the error returns.
    pub async fn launch_services(&mut self) -> Result<(), SupervisorError> {
        self.set_phase(Phase::Launching);
        let result = self.launch_in_order().await;
        if result.is_err() {
            if !self.state.is_empty() {
                warn!("rolling back partially started services");
            }
            self.shutdown().await;
            self.set_phase(Phase::Idle);
        }
        result
    }

    async fn launch_in_order(&mut self) -> Result<(), SupervisorError> {
        self.check_environment().await?;

        for kind in ServiceKind::STARTUP_ORDER {
            if self.cancel.is_cancelled() {
                return Err(SupervisorError::Interrupted);
            }
            info!(service = %kind, "starting");
            let launched = self.launcher.launch(self.plan.spec(kind)).await;
            match launched {
                Ok(handle) => {
                    if let Some(previous) = self.state.insert(handle) {
                        warn!(service = %kind, pid = previous.pid(), "replaced an existing handle");
                    }
                }
                Err(e) => {
                    error!(service = %kind, "launch failed");
                    return Err(e.into());
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(SupervisorError::Interrupted);
        }
        // A service can die while a later one is still installing or
        // waiting for readiness.
        for kind in ServiceKind::STARTUP_ORDER {
            let Some(handle) = self.state.handle_mut(kind) else {
                continue;
            };
            if let Some(exit) = handle.exit_info() {
                error!(service = %kind, exit = %exit, "process died during startup");
                handle.set_status(ServiceStatus::Failed);
                return Err(SupervisorError::RuntimeFailure { kind, exit });
            }
        }
        self.state.set_running(true);
        Ok(())
    }

    /// Watch the running children until one exits or the token is
    /// cancelled, then shut everything down.
    pub async fn supervise(&mut self) -> StopReason {
        self.set_phase(Phase::Monitoring);

        let watches: Vec<_> = ServiceKind::STARTUP_ORDER
            .iter()
            .filter_map(|&kind| self.state.handle(kind).map(|h| (kind, h.exit_watch())))
            .collect();
        let mut monitor = tokio::spawn(monitor_children(
            watches,
            self.state.running_flag(),
            self.plan.monitor_interval,
        ));

        let reason = tokio::select! {
            joined = &mut monitor => match joined {
                Ok((kind, exit)) => StopReason::ServiceExited { kind, exit },
                Err(e) => {
                    error!(error = %e, "monitor task failed");
                    StopReason::Interrupted
                }
            },
            _ = self.cancel.cancelled() => {
                monitor.abort();
                StopReason::Interrupted
            }
        };

        if let StopReason::ServiceExited { kind, .. } = &reason {
            if let Some(handle) = self.state.handle_mut(*kind) {
                handle.set_status(ServiceStatus::Failed);
            }
        }
        self.shutdown().await;
        reason
    }

    /// Stop every child in reverse startup order: SIGTERM to its process
    /// group, then SIGKILL after the grace period. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        self.state.set_running(false);
        if self.state.is_empty() {
            return;
        }
        self.set_phase(Phase::ShuttingDown);

        let grace = self.plan.grace;
        for kind in ServiceKind::STARTUP_ORDER.iter().rev() {
            if let Some(handle) = self.state.handle_mut(*kind) {
                stop_child(handle, grace).await;
            }
        }
        self.set_phase(Phase::Idle);
    }

    /// The full `start` cycle. Blocks until the services are stopped.
    ///
    /// A stop requested while both services run is a success; a child
    /// exiting on its own is a [`SupervisorError::RuntimeFailure`].
    pub async fn start(&mut self) -> Result<(), SupervisorError> {
        self.clean().await?;
        if self.cancel.is_cancelled() {
            return Err(SupervisorError::Interrupted);
        }

        self.launch_services().await?;
        print_startup_summary(&self.state, &self.plan);

        match self.supervise().await {
            StopReason::Interrupted => {
                info!("all services stopped");
                Ok(())
            }
            StopReason::ServiceExited { kind, exit } => {
                Err(SupervisorError::RuntimeFailure { kind, exit })
            }
        }
    }
}

/// Poll the exit watches every `interval` and resolve with the first exit
/// seen. Clears `running` before returning.
async fn monitor_children(
    watches: Vec<(ServiceKind, watch::Receiver<Option<ExitInfo>>)>,
    running: Arc<AtomicBool>,
    interval: Duration,
) -> (ServiceKind, ExitInfo) {
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        for (kind, rx) in &watches {
            let exit = rx.borrow().clone();
            if let Some(exit) = exit {
                running.store(false, Ordering::SeqCst);
                error!(service = %kind, exit = %exit, "process died unexpectedly");
                return (*kind, exit);
            }
        }
    }
}

fn signal_tree(pid: u32, how: Termination) -> SignalOutcome {
    match platform::signal_group(pid, how) {
        SignalOutcome::Failed(reason) => {
            warn!(pid, %reason, "group signal failed, signalling the process only");
            platform::signal_process(pid, how)
        }
        outcome => outcome,
    }
}

async fn stop_child(handle: &mut ServiceHandle, grace: Duration) {
    let kind = handle.kind();
    let pid = handle.pid();
    match handle.status() {
        ServiceStatus::Stopped | ServiceStatus::NotStarted => return,
        ServiceStatus::Failed => {
            // It already exited, but grandchildren may still hold the group.
            let _ = platform::signal_group(pid, Termination::Forceful);
            return;
        }
        _ => {}
    }

    handle.set_status(ServiceStatus::Stopping);
    if handle.has_exited() {
        let _ = platform::signal_group(pid, Termination::Forceful);
    } else {
        info!(service = %kind, pid, "stopping");
        if signal_tree(pid, Termination::Graceful) != SignalOutcome::Gone
            && handle.wait_exit(grace).await.is_none()
        {
            warn!(
                service = %kind,
                pid,
                grace_ms = grace.as_millis() as u64,
                "still running after grace period, killing"
            );
            signal_tree(pid, Termination::Forceful);
            if handle.wait_exit(KILL_WAIT).await.is_none() {
                error!(service = %kind, pid, "did not exit after SIGKILL");
            }
        }
    }
    handle.drain_output(DRAIN_WAIT).await;
    handle.set_status(ServiceStatus::Stopped);
    info!(service = %kind, pid, "stopped");
}
