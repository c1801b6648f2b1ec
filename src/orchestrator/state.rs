use chrono::{DateTime, Utc};
use std::fmt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::orchestrator::ready::exited;
use crate::orchestrator::service::ServiceKind;
use crate::ui::buffer::LogBuffer;
use crate::ui::logs::LogLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    NotStarted,
    Starting,
    Running,
    Failed,
    Stopping,
    Stopped,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::NotStarted => "not started",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Failed => "failed",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub detail: String,
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
            detail: status.to_string(),
        }
    }
}

impl fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.detail)
    }
}

/// Bounded stdout/stderr history for one child.
pub struct CapturedOutput {
    pub stdout: LogBuffer,
    pub stderr: LogBuffer,
}

impl CapturedOutput {
    pub fn new(capacity: usize) -> Self {
        Self {
            stdout: LogBuffer::new(capacity),
            stderr: LogBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, line: LogLine) {
        if line.is_stderr {
            self.stderr.push(line);
        } else {
            self.stdout.push(line);
        }
    }
}

pub type SharedOutput = Arc<Mutex<CapturedOutput>>;

/// A launched child process owned by the supervisor.
///
/// The child itself lives in a background task that reaps it and publishes
/// its exit on a watch channel; the handle only observes that channel.
pub struct ServiceHandle {
    kind: ServiceKind,
    pid: u32,
    status: ServiceStatus,
    started_at: DateTime<Utc>,
    exit: watch::Receiver<Option<ExitInfo>>,
    output: SharedOutput,
    pumps: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    pub(crate) fn new(
        kind: ServiceKind,
        pid: u32,
        exit: watch::Receiver<Option<ExitInfo>>,
        output: SharedOutput,
        pumps: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            kind,
            pid,
            status: ServiceStatus::Starting,
            started_at: Utc::now(),
            exit,
            output,
            pumps,
        }
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub(crate) fn set_status(&mut self, status: ServiceStatus) {
        tracing::debug!(service = %self.kind, from = %self.status, to = %status, "status change");
        self.status = status;
    }

    /// The exit, if the child has already been reaped.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        self.exit.borrow().clone()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    /// A read-only view of the exit channel for the monitor.
    pub fn exit_watch(&self) -> watch::Receiver<Option<ExitInfo>> {
        self.exit.clone()
    }

    pub(crate) fn exit_watch_mut(&mut self) -> &mut watch::Receiver<Option<ExitInfo>> {
        &mut self.exit
    }

    /// Wait up to `timeout` for the child to exit.
    pub(crate) async fn wait_exit(&mut self, timeout: Duration) -> Option<ExitInfo> {
        tokio::time::timeout(timeout, exited(&mut self.exit)).await.ok()
    }

    /// Wait up to `timeout` for the output readers to reach EOF.
    ///
    /// Grandchildren that inherited the pipes can keep them open, so this
    /// gives up rather than blocking.
    pub(crate) async fn drain_output(&mut self, timeout: Duration) {
        let pumps = std::mem::take(&mut self.pumps);
        let _ = tokio::time::timeout(timeout, async {
            for pump in pumps {
                let _ = pump.await;
            }
        })
        .await;
    }

    pub fn stdout(&self) -> String {
        let output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        output.stdout.joined()
    }

    pub fn stderr(&self) -> String {
        let output = self.output.lock().unwrap_or_else(|e| e.into_inner());
        output.stderr.joined()
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("kind", &self.kind)
            .field("pid", &self.pid)
            .field("status", &self.status)
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Everything one `start` invocation knows about its children.
#[derive(Debug, Default)]
pub struct SupervisorState {
    backend: Option<ServiceHandle>,
    frontend: Option<ServiceHandle>,
    running: Arc<AtomicBool>,
}

impl SupervisorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, kind: ServiceKind) -> Option<&ServiceHandle> {
        match kind {
            ServiceKind::Backend => self.backend.as_ref(),
            ServiceKind::Frontend => self.frontend.as_ref(),
        }
    }

    pub(crate) fn handle_mut(&mut self, kind: ServiceKind) -> Option<&mut ServiceHandle> {
        match kind {
            ServiceKind::Backend => self.backend.as_mut(),
            ServiceKind::Frontend => self.frontend.as_mut(),
        }
    }

    /// Store a handle, replacing (and returning) any previous one of the
    /// same kind.
    pub(crate) fn insert(&mut self, handle: ServiceHandle) -> Option<ServiceHandle> {
        let slot = match handle.kind() {
            ServiceKind::Backend => &mut self.backend,
            ServiceKind::Frontend => &mut self.frontend,
        };
        slot.replace(handle)
    }

    pub fn status(&self, kind: ServiceKind) -> ServiceStatus {
        self.handle(kind)
            .map(ServiceHandle::status)
            .unwrap_or(ServiceStatus::NotStarted)
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_none() && self.frontend.is_none()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    /// Shared flag the monitor clears when it sees a child exit.
    pub(crate) fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}
