use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::orchestrator::ports::{PortBinding, PortGuard};
use crate::orchestrator::scanner::{ProcessRecord, ProcessScanner};
use crate::orchestrator::service::Pattern;
use crate::platform::{self, SignalOutcome, Termination};

/// What is still around after a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Residue {
    pub processes: Vec<ProcessRecord>,
    pub ports: Vec<PortBinding>,
}

impl Residue {
    pub fn is_clean(&self) -> bool {
        self.processes.is_empty() && self.ports.is_empty()
    }
}

impl fmt::Display for Residue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.processes.is_empty() {
            writeln!(f, "  {} process(es) still running:", self.processes.len())?;
            for record in &self.processes {
                writeln!(f, "    - {}", record)?;
            }
        }
        for binding in &self.ports {
            writeln!(f, "  - {}", binding)?;
        }
        Ok(())
    }
}

/// Terminates stale instances and frees the well-known ports in one pass.
pub struct ProcessReaper<'a> {
    scanner: &'a ProcessScanner,
    guard: &'a PortGuard,
    patterns: &'a [Pattern],
    ports: &'a [u16],
    settle: Duration,
    signal: fn(u32, Termination) -> SignalOutcome,
}

impl<'a> ProcessReaper<'a> {
    pub fn new(
        scanner: &'a ProcessScanner,
        guard: &'a PortGuard,
        patterns: &'a [Pattern],
        ports: &'a [u16],
        settle: Duration,
    ) -> Self {
        Self {
            scanner,
            guard,
            patterns,
            ports,
            settle,
            signal: platform::signal_process,
        }
    }

    /// Use a custom signal action for matched processes.
    pub fn with_signal(mut self, signal: fn(u32, Termination) -> SignalOutcome) -> Self {
        self.signal = signal;
        self
    }

    /// Processes currently matching any pattern.
    pub fn conflicts(&self) -> Vec<ProcessRecord> {
        self.scanner.find_processes(self.patterns)
    }

    /// Ask every matching process to terminate, force-free the ports, then
    /// let things settle. Returns the number of termination actions taken.
    ///
    /// A single pass: nothing is retried, call [`verify`](Self::verify) after.
    pub async fn cleanup(&self) -> usize {
        let mut signalled = BTreeSet::new();
        for record in self.conflicts() {
            // A process matched by several patterns is only signalled once.
            if !signalled.insert(record.pid) {
                continue;
            }
            match (self.signal)(record.pid, Termination::Graceful) {
                SignalOutcome::Sent => info!(pid = record.pid, "stopped {}", record.label),
                SignalOutcome::Gone => {
                    debug!(pid = record.pid, "{} already gone", record.label);
                    signalled.remove(&record.pid);
                }
                SignalOutcome::Failed(reason) => {
                    warn!(pid = record.pid, %reason, "could not stop {}", record.label);
                    signalled.remove(&record.pid);
                }
            }
        }

        let mut actions = signalled.len();
        for &port in self.ports {
            let killed = self.guard.free(port);
            if killed > 0 {
                info!(port, killed, "port cleared");
            }
            actions += killed;
        }

        if actions > 0 {
            info!(
                settle_ms = self.settle.as_millis() as u64,
                "waiting for processes to exit"
            );
            tokio::time::sleep(self.settle).await;
        }
        actions
    }

    /// Re-scan patterns and ports.
    pub fn residue(&self) -> Residue {
        Residue {
            processes: self.conflicts(),
            ports: self
                .ports
                .iter()
                .map(|&port| self.guard.binding(port))
                .filter(|b| !b.is_free())
                .collect(),
        }
    }

    /// True only when no pattern matches and every port is unoccupied.
    pub fn verify(&self) -> bool {
        self.residue().is_clean()
    }
}
