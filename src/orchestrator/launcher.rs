use std::future::Future;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::orchestrator::error::LaunchError;
use crate::orchestrator::ready::Readiness;
use crate::orchestrator::service::{InstallStep, ServiceSpec};
use crate::orchestrator::state::{
    CapturedOutput, ExitInfo, ServiceHandle, ServiceStatus, SharedOutput,
};
use crate::platform::{self, Termination};
use crate::ui::logs::LogLine;

/// How long to wait for the output readers after a child has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for a child killed after a failed readiness probe.
const KILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Spawns one service and decides whether it came up.
pub trait Launch: Send + Sync {
    fn launch(
        &self,
        spec: &ServiceSpec,
    ) -> impl Future<Output = Result<ServiceHandle, LaunchError>> + Send;
}

/// The real launcher: spawns OS processes and captures their output.
#[derive(Clone)]
pub struct ServiceLauncher {
    output_lines: usize,
    log_tx: Option<mpsc::Sender<LogLine>>,
}

impl ServiceLauncher {
    pub fn new(output_lines: usize) -> Self {
        Self {
            output_lines,
            log_tx: None,
        }
    }

    /// Also forward every captured line to `tx` (usually a [`LogWriter`]).
    ///
    /// [`LogWriter`]: crate::ui::logs::LogWriter
    pub fn with_log_sink(mut self, tx: mpsc::Sender<LogLine>) -> Self {
        self.log_tx = Some(tx);
        self
    }

    async fn run_install(&self, spec: &ServiceSpec, step: &InstallStep) -> Result<(), LaunchError> {
        let sentinel = spec.working_dir.join(&step.sentinel);
        if sentinel.exists() {
            debug!(service = %spec.kind, sentinel = %sentinel.display(), "dependencies already installed");
            return Ok(());
        }

        let command = step.command_line();
        info!(service = %spec.kind, "installing dependencies: {}", command);

        let mut cmd = Command::new(&step.program);
        cmd.args(&step.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let install_failed = |reason: String, output: String| LaunchError::Install {
            kind: spec.kind,
            command: command.clone(),
            reason,
            output,
        };

        let output = match tokio::time::timeout(step.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(install_failed(e.to_string(), String::new())),
            Err(_) => {
                return Err(install_failed(
                    format!("timed out after {}", humantime::format_duration(step.timeout)),
                    String::new(),
                ))
            }
        };

        if !output.status.success() {
            let mut text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(stderr);
            }
            return Err(install_failed(output.status.to_string(), text));
        }

        info!(service = %spec.kind, "dependencies installed");
        Ok(())
    }

    fn pump<R>(&self, reader: Option<R>, service: &str, is_stderr: bool, output: &SharedOutput) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let tx = self.log_tx.clone();
        let svc = service.to_string();
        let output = Arc::clone(output);
        tokio::spawn(async move {
            let Some(reader) = reader else {
                return;
            };
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let text = line.trim_end_matches(['\n', '\r']).to_string();
                        let entry = LogLine::new(&svc, text, is_stderr);
                        if let Some(ref tx) = tx {
                            let _ = tx.send(entry.clone()).await;
                        }
                        output.lock().unwrap_or_else(|e| e.into_inner()).push(entry);
                    }
                    Err(e) => {
                        warn!(service = %svc, error = %e, stderr = is_stderr, "output read error");
                        break;
                    }
                }
            }
        })
    }

    async fn launch_spec(&self, spec: &ServiceSpec) -> Result<ServiceHandle, LaunchError> {
        if !spec.working_dir.is_dir() {
            return Err(LaunchError::MissingDirectory {
                kind: spec.kind,
                path: spec.working_dir.clone(),
            });
        }

        if let Some(step) = &spec.install {
            self.run_install(spec, step).await?;
        }

        let command = spec.command_line();
        info!(service = %spec.kind, dir = %spec.working_dir.display(), "spawning: {}", command);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        platform::configure_process_group(&mut cmd);

        let spawn_failed = |reason: String| LaunchError::Spawn {
            kind: spec.kind,
            command: command.clone(),
            reason,
        };

        let mut child = cmd.spawn().map_err(|e| spawn_failed(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_failed("child exited before its pid was read".to_string()))?;
        debug!(service = %spec.kind, pid, "child spawned");

        let output: SharedOutput = Arc::new(Mutex::new(CapturedOutput::new(self.output_lines)));
        let pumps = vec![
            self.pump(child.stdout.take(), spec.kind.as_str(), false, &output),
            self.pump(child.stderr.take(), spec.kind.as_str(), true, &output),
        ];

        // The child is moved into a reaper task; everyone else watches the
        // channel it publishes the exit on.
        let (exit_tx, exit_rx) = watch::channel::<Option<ExitInfo>>(None);
        let service = spec.kind;
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    debug!(service = %service, pid, status = %status, "child exited");
                    exit_tx.send_replace(Some(ExitInfo::from(status)));
                }
                Err(e) => {
                    error!(service = %service, pid, error = %e, "wait() failed");
                    exit_tx.send_replace(Some(ExitInfo {
                        code: None,
                        detail: format!("wait failed: {}", e),
                    }));
                }
            }
        });

        let mut handle = ServiceHandle::new(spec.kind, pid, exit_rx, output, pumps);
        info!(
            service = %spec.kind,
            pid,
            window_ms = spec.readiness.window().as_millis() as u64,
            "waiting for readiness",
        );

        match spec.readiness.wait(handle.exit_watch_mut()).await {
            Readiness::Ready => {
                handle.set_status(ServiceStatus::Running);
                info!(service = %spec.kind, pid, "started on {}", spec.url());
                Ok(handle)
            }
            Readiness::Exited(exit) => {
                handle.set_status(ServiceStatus::Failed);
                handle.drain_output(DRAIN_TIMEOUT).await;
                error!(service = %spec.kind, pid, exit = %exit, "exited during startup");
                Err(LaunchError::ExitedEarly {
                    kind: spec.kind,
                    exit,
                    stdout: handle.stdout(),
                    stderr: handle.stderr(),
                })
            }
            Readiness::TimedOut(waited) => {
                warn!(service = %spec.kind, pid, "not ready in time, killing");
                platform::signal_group(pid, Termination::Forceful);
                handle.wait_exit(KILL_TIMEOUT).await;
                handle.set_status(ServiceStatus::Failed);
                handle.drain_output(DRAIN_TIMEOUT).await;
                Err(LaunchError::NotReady {
                    kind: spec.kind,
                    waited,
                    stdout: handle.stdout(),
                    stderr: handle.stderr(),
                })
            }
        }
    }
}

impl Launch for ServiceLauncher {
    fn launch(
        &self,
        spec: &ServiceSpec,
    ) -> impl Future<Output = Result<ServiceHandle, LaunchError>> + Send {
        self.launch_spec(spec)
    }
}
