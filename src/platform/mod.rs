use std::collections::BTreeSet;
use tokio::process::Command;

#[cfg(unix)]
mod unix;

#[cfg(unix)]
use unix as imp;

#[cfg(not(unix))]
compile_error!("srrctl only supports unix hosts");

/// How hard to ask a process to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forceful,
}

/// Result of a best-effort OS query.
///
/// A query that could not run is `Unavailable`, which callers treat as an
/// empty result rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(BTreeSet<u32>),
    Unavailable(String),
}

impl Lookup {
    pub fn empty() -> Self {
        Lookup::Found(BTreeSet::new())
    }

    /// The PIDs found, or an empty set when the query was unavailable.
    pub fn into_pids(self) -> BTreeSet<u32> {
        match self {
            Lookup::Found(pids) => pids,
            Lookup::Unavailable(_) => BTreeSet::new(),
        }
    }
}

/// Outcome of sending a signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Sent,
    /// The process (or group) no longer exists.
    Gone,
    Failed(String),
}

/// Find PIDs whose command line contains `needle` as a substring.
/// The calling process is never included.
pub fn find_by_cmdline(needle: &str) -> Lookup {
    imp::find_by_cmdline(needle)
}

/// Find PIDs holding a TCP socket bound to the given local port.
pub fn port_holders(port: u16) -> Lookup {
    imp::port_holders(port)
}

/// Configure the command to run in a new process group so the whole tree
/// can be signalled at once.
pub fn configure_process_group(cmd: &mut Command) {
    imp::configure_process_group(cmd)
}

/// Signal a single process.
pub fn signal_process(pid: u32, how: Termination) -> SignalOutcome {
    imp::signal_process(pid, how)
}

/// Signal the process group led by `pgid`.
pub fn signal_group(pgid: u32, how: Termination) -> SignalOutcome {
    imp::signal_group(pgid, how)
}

/// Check if a process with the given PID is still alive.
pub fn is_process_alive(pid: u32) -> bool {
    imp::is_process_alive(pid)
}

/// Resolve once the operator asks the supervisor to stop (interrupt or
/// terminate). Returns the signal name.
pub async fn shutdown_signal() -> &'static str {
    imp::shutdown_signal().await
}


#[cfg(test)]
pub mod test_commands {
    /// A command that keeps running until signalled.
    pub fn sleep_long() -> (&'static str, Vec<String>) {
        ("sleep", vec!["60".to_string()])
    }

    /// A shell command line run through `sh -c`.
    pub fn shell(script: &str) -> (&'static str, Vec<String>) {
        ("sh", vec!["-c".to_string(), script.to_string()])
    }

    /// A process that ignores SIGTERM for its whole lifetime.
    pub fn ignore_term() -> (&'static str, Vec<String>) {
        shell("trap '' TERM; sleep 60")
    }
}
