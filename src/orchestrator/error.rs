// The miette/thiserror derive macros generate code that triggers false
// positive unused_assignments warnings on enum variant fields.
#![allow(unused_assignments)]

use std::path::PathBuf;
use std::time::Duration;

use miette::Diagnostic;
use thiserror::Error;

use crate::orchestrator::preflight::PreflightReport;
use crate::orchestrator::reaper::Residue;
use crate::orchestrator::service::ServiceKind;
use crate::orchestrator::state::ExitInfo;

fn captured(stdout: &str, stderr: &str) -> String {
    format!("STDOUT: {}\nSTDERR: {}", stdout, stderr)
}

/// Why a single service could not be brought up.
#[derive(Debug, Error, Diagnostic)]
pub enum LaunchError {
    #[error("{kind} directory not found: {}", path.display())]
    #[diagnostic(code(srrctl::launch::missing_directory))]
    MissingDirectory { kind: ServiceKind, path: PathBuf },

    #[error("{kind} dependency install `{command}` failed ({reason})\n{output}")]
    #[diagnostic(code(srrctl::launch::install))]
    Install {
        kind: ServiceKind,
        command: String,
        reason: String,
        output: String,
    },

    #[error("failed to spawn {kind} `{command}`: {reason}")]
    #[diagnostic(code(srrctl::launch::spawn))]
    Spawn {
        kind: ServiceKind,
        command: String,
        reason: String,
    },

    #[error("{kind} failed to start ({exit})\n{}", captured(stdout, stderr))]
    #[diagnostic(code(srrctl::launch::exited))]
    ExitedEarly {
        kind: ServiceKind,
        exit: ExitInfo,
        stdout: String,
        stderr: String,
    },

    #[error("{kind} was not ready after {}\n{}", humantime::format_duration(*waited), captured(stdout, stderr))]
    #[diagnostic(code(srrctl::launch::not_ready))]
    NotReady {
        kind: ServiceKind,
        waited: Duration,
        stdout: String,
        stderr: String,
    },
}

impl LaunchError {
    pub fn kind(&self) -> ServiceKind {
        match self {
            LaunchError::MissingDirectory { kind, .. }
            | LaunchError::Install { kind, .. }
            | LaunchError::Spawn { kind, .. }
            | LaunchError::ExitedEarly { kind, .. }
            | LaunchError::NotReady { kind, .. } => *kind,
        }
    }
}

/// Every way a supervisor command can fail.
#[derive(Debug, Error, Diagnostic)]
pub enum SupervisorError {
    #[error("environment check failed\n{report}")]
    #[diagnostic(code(srrctl::environment))]
    Environment {
        report: PreflightReport,
        #[help]
        advice: String,
    },

    #[error("cleanup incomplete, launching could fail\n{residue}")]
    #[diagnostic(
        code(srrctl::conflict),
        help("stop the listed processes manually, then run the command again")
    )]
    Conflict { residue: Residue },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Launch(#[from] LaunchError),

    #[error("{kind} process died unexpectedly ({exit})")]
    #[diagnostic(code(srrctl::runtime_failure))]
    RuntimeFailure { kind: ServiceKind, exit: ExitInfo },

    #[error("startup interrupted before both services were running")]
    #[diagnostic(code(srrctl::interrupted))]
    Interrupted,
}
