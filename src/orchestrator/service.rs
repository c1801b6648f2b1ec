use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::SrrConfig;
use crate::orchestrator::preflight::Preflight;
use crate::orchestrator::ready::ReadinessProbe;

pub const BACKEND_PORT: u16 = 8001;
pub const FRONTEND_PORT: u16 = 3000;

const BACKEND_DIR: &str = "src/api";
const BACKEND_ENTRY: &str = "main.py";
const FRONTEND_DIR: &str = "frontend/srr-chatbot";
const FRONTEND_SENTINEL: &str = "node_modules";
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

/// One of the two supervised services, in startup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceKind {
    Backend,
    Frontend,
}

impl ServiceKind {
    pub const STARTUP_ORDER: [ServiceKind; 2] = [ServiceKind::Backend, ServiceKind::Frontend];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Backend => "backend",
            ServiceKind::Frontend => "frontend",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a discovered OS process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    Backend,
    Frontend,
    Other,
}

impl From<ServiceKind> for ProcessKind {
    fn from(kind: ServiceKind) -> Self {
        match kind {
            ServiceKind::Backend => ProcessKind::Backend,
            ServiceKind::Frontend => ProcessKind::Frontend,
        }
    }
}

/// A command-line substring identifying a stale instance.
///
/// Matching is a plain substring test, so unrelated processes that happen
/// to share the text are matched too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub kind: ProcessKind,
    pub needle: String,
    pub label: String,
}

impl Pattern {
    pub fn new(kind: ProcessKind, needle: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            needle: needle.into(),
            label: label.into(),
        }
    }
}

/// Patterns for instances left behind by earlier runs.
pub fn default_patterns() -> Vec<Pattern> {
    vec![
        Pattern::new(ProcessKind::Backend, "main.py", "Python Backend"),
        Pattern::new(ProcessKind::Frontend, "react-scripts", "React Frontend"),
        Pattern::new(ProcessKind::Other, "npm start", "NPM Start"),
    ]
}

/// One-time dependency materialization run before the first spawn.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallStep {
    /// Directory (relative to the working directory) whose presence means
    /// the step already ran.
    pub sentinel: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl InstallStep {
    pub fn command_line(&self) -> String {
        join_command(&self.program, &self.args)
    }
}

/// Everything needed to launch one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSpec {
    pub kind: ServiceKind,
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub port: u16,
    pub readiness: ReadinessProbe,
    pub install: Option<InstallStep>,
}

impl ServiceSpec {
    pub fn backend(root: &Path, config: &SrrConfig) -> Self {
        Self {
            kind: ServiceKind::Backend,
            program: config.runtime.python.clone(),
            args: vec![BACKEND_ENTRY.to_string()],
            working_dir: root.join(BACKEND_DIR),
            port: BACKEND_PORT,
            readiness: ReadinessProbe::Delay(config.timing.backend_ready),
            install: None,
        }
    }

    pub fn frontend(root: &Path, config: &SrrConfig) -> Self {
        Self {
            kind: ServiceKind::Frontend,
            program: config.runtime.npm.clone(),
            args: vec!["start".to_string()],
            working_dir: root.join(FRONTEND_DIR),
            port: FRONTEND_PORT,
            readiness: ReadinessProbe::Delay(config.timing.frontend_ready),
            install: Some(InstallStep {
                sentinel: PathBuf::from(FRONTEND_SENTINEL),
                program: config.runtime.npm.clone(),
                args: vec!["install".to_string()],
                timeout: INSTALL_TIMEOUT,
            }),
        }
    }

    pub fn command_line(&self) -> String {
        join_command(&self.program, &self.args)
    }

    pub fn url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

fn join_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The full set of inputs for one `start`, `check` or `cleanup` run.
#[derive(Debug, Clone)]
pub struct SupervisorPlan {
    pub backend: ServiceSpec,
    pub frontend: ServiceSpec,
    pub patterns: Vec<Pattern>,
    pub preflight: Preflight,
    pub settle: Duration,
    pub grace: Duration,
    pub monitor_interval: Duration,
}

impl SupervisorPlan {
    pub fn for_project(root: &Path, config: &SrrConfig) -> Self {
        Self {
            backend: ServiceSpec::backend(root, config),
            frontend: ServiceSpec::frontend(root, config),
            patterns: default_patterns(),
            preflight: Preflight::srr(root, &config.runtime),
            settle: config.timing.settle,
            grace: config.timing.grace,
            monitor_interval: config.timing.monitor_interval,
        }
    }

    pub fn spec(&self, kind: ServiceKind) -> &ServiceSpec {
        match kind {
            ServiceKind::Backend => &self.backend,
            ServiceKind::Frontend => &self.frontend,
        }
    }

    /// Well-known ports, in startup order.
    pub fn ports(&self) -> Vec<u16> {
        vec![self.backend.port, self.frontend.port]
    }
}
