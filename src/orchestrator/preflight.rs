use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::model::RuntimeConfig;

/// Upper bound for a single probe subprocess.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

const REQUIRED_LIBRARIES: &[&str] = &["fastapi", "uvicorn", "easyocr", "transformers"];

const REQUIRED_DATA_FILES: &[&str] = &[
    "ai_models/training_data.pkl",
    "mapping_rules/slope_location_mapping.json",
    "config/srr_rules.json",
    "config/keyword_rules.json",
    "metadata.json",
];

/// A subprocess used to probe for something. `{}` in an argument is
/// replaced by the name being probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ProbeCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Run the probe; `Some(output)` when it exits successfully.
    async fn run(&self, subject: &str) -> Option<String> {
        let args: Vec<String> = self.args.iter().map(|a| a.replace("{}", subject)).collect();
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
                // Some tools print their version to stderr
                if stdout.is_empty() {
                    Some(String::from_utf8_lossy(&output.stderr).trim().to_string())
                } else {
                    Some(stdout)
                }
            }
            Ok(Ok(output)) => {
                debug!(program = %self.program, subject, status = %output.status, "probe failed");
                None
            }
            Ok(Err(e)) => {
                debug!(program = %self.program, subject, error = %e, "probe could not run");
                None
            }
            Err(_) => {
                debug!(program = %self.program, subject, "probe timed out");
                None
            }
        }
    }
}

/// An external runtime that must be installed, e.g. Node.js.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeProbe {
    pub name: String,
    pub probe: ProbeCommand,
    pub hint: String,
}

/// Environment checks run before anything is spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    pub libraries: Vec<String>,
    pub library_probe: ProbeCommand,
    pub library_hint: String,
    pub runtime: Option<RuntimeProbe>,
    pub models_dir: PathBuf,
    pub data_files: Vec<String>,
}

impl Preflight {
    pub fn srr(root: &Path, runtime: &RuntimeConfig) -> Self {
        Self {
            libraries: REQUIRED_LIBRARIES.iter().map(|s| s.to_string()).collect(),
            library_probe: ProbeCommand::new(runtime.python.clone(), &["-c", "import {}"]),
            library_hint: "pip install -r config/requirements.txt".to_string(),
            runtime: Some(RuntimeProbe {
                name: "Node.js".to_string(),
                probe: ProbeCommand::new(runtime.node.clone(), &["--version"]),
                hint: "install Node.js 16+ from https://nodejs.org/".to_string(),
            }),
            models_dir: root.join("models"),
            data_files: REQUIRED_DATA_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub async fn check_dependencies(&self) -> DependencyReport {
        let mut missing_libraries = Vec::new();
        for library in &self.libraries {
            if self.library_probe.run(library).await.is_none() {
                missing_libraries.push(library.clone());
            }
        }

        let runtime = match &self.runtime {
            Some(rt) => {
                let version = rt.probe.run(&rt.name).await;
                Some(RuntimeStatus {
                    name: rt.name.clone(),
                    version,
                })
            }
            None => None,
        };

        DependencyReport {
            missing_libraries,
            runtime,
        }
    }

    pub fn check_data_files(&self) -> DataReport {
        let missing_files = self
            .data_files
            .iter()
            .filter(|name| !self.models_dir.join(name).exists())
            .cloned()
            .collect();
        DataReport {
            models_dir: self.models_dir.clone(),
            missing_files,
        }
    }

    /// Run every check; nothing short-circuits so the report is complete.
    pub async fn run(&self) -> PreflightReport {
        PreflightReport {
            dependencies: self.check_dependencies().await,
            data: self.check_data_files(),
        }
    }

    /// Remediation text for everything that failed in `report`.
    pub fn advice(&self, report: &PreflightReport) -> String {
        let mut hints = Vec::new();
        if !report.dependencies.missing_libraries.is_empty() {
            hints.push(format!("run: {}", self.library_hint));
        }
        if report.dependencies.runtime_missing() {
            if let Some(rt) = &self.runtime {
                hints.push(rt.hint.clone());
            }
        }
        if !report.data.is_ok() {
            hints.push(format!(
                "ensure model files are in {} (run the data conversion script to generate them)",
                report.data.models_dir.display()
            ));
        }
        hints.join("; ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub name: String,
    /// Reported version, or None when the runtime is missing.
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub missing_libraries: Vec<String>,
    pub runtime: Option<RuntimeStatus>,
}

impl DependencyReport {
    pub fn runtime_missing(&self) -> bool {
        self.runtime.as_ref().is_some_and(|rt| rt.version.is_none())
    }

    pub fn is_ok(&self) -> bool {
        self.missing_libraries.is_empty() && !self.runtime_missing()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataReport {
    pub models_dir: PathBuf,
    pub missing_files: Vec<String>,
}

impl DataReport {
    pub fn is_ok(&self) -> bool {
        self.missing_files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    pub dependencies: DependencyReport,
    pub data: DataReport,
}

impl PreflightReport {
    pub fn is_ok(&self) -> bool {
        self.dependencies.is_ok() && self.data.is_ok()
    }
}

impl fmt::Display for PreflightReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.dependencies.missing_libraries.is_empty() {
            writeln!(
                f,
                "  - missing Python libraries: {}",
                self.dependencies.missing_libraries.join(", ")
            )?;
        }
        if let Some(rt) = &self.dependencies.runtime {
            if rt.version.is_none() {
                writeln!(f, "  - {} not found", rt.name)?;
            }
        }
        if !self.data.missing_files.is_empty() {
            writeln!(
                f,
                "  - missing model files in {}: {}",
                self.data.models_dir.display(),
                self.data.missing_files.join(", ")
            )?;
        }
        Ok(())
    }
}
