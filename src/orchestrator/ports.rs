use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::platform::{self, Lookup, SignalOutcome, Termination};

/// Processes holding one TCP port at the moment it was queried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub port: u16,
    pub occupying_pids: BTreeSet<u32>,
}

impl PortBinding {
    pub fn is_free(&self) -> bool {
        self.occupying_pids.is_empty()
    }
}

impl fmt::Display for PortBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_free() {
            return write!(f, "Port {} is free", self.port);
        }
        let pids: Vec<String> = self.occupying_pids.iter().map(u32::to_string).collect();
        write!(f, "Port {} is still in use by PID {}", self.port, pids.join(", "))
    }
}

/// Inspects and force-releases TCP ports.
#[derive(Clone)]
pub struct PortGuard {
    holders: fn(u16) -> Lookup,
    kill: fn(u32, Termination) -> SignalOutcome,
}

impl Default for PortGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl PortGuard {
    pub fn new() -> Self {
        Self {
            holders: platform::port_holders,
            kill: platform::signal_process,
        }
    }

    /// Use custom port queries and kill actions.
    pub fn with_ops(holders: fn(u16) -> Lookup, kill: fn(u32, Termination) -> SignalOutcome) -> Self {
        Self { holders, kill }
    }

    /// PIDs listening on or holding `port`. A failed query is an empty set.
    pub fn occupants_of(&self, port: u16) -> BTreeSet<u32> {
        match (self.holders)(port) {
            Lookup::Found(pids) => pids,
            Lookup::Unavailable(reason) => {
                warn!(port, %reason, "port query failed, treating as free");
                BTreeSet::new()
            }
        }
    }

    pub fn binding(&self, port: u16) -> PortBinding {
        PortBinding {
            port,
            occupying_pids: self.occupants_of(port),
        }
    }

    /// Force-kill every occupant of `port` and return how many were killed.
    /// Does not wait for the port to be released.
    pub fn free(&self, port: u16) -> usize {
        let me = std::process::id();
        let mut killed = 0;
        for pid in self.occupants_of(port) {
            if pid == me {
                warn!(port, "port is held by this process, not killing it");
                continue;
            }
            match (self.kill)(pid, Termination::Forceful) {
                SignalOutcome::Sent => {
                    info!(port, pid, "killed port occupant");
                    killed += 1;
                }
                SignalOutcome::Gone => debug!(port, pid, "port occupant already gone"),
                SignalOutcome::Failed(reason) => {
                    warn!(port, pid, %reason, "could not kill port occupant")
                }
            }
        }
        killed
    }
}

impl fmt::Debug for PortGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortGuard").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_holders(port: u16) -> Lookup {
        match port {
            8001 => Lookup::Found(BTreeSet::from([100, 101, std::process::id()])),
            3000 => Lookup::Unavailable("lsof not installed".into()),
            _ => Lookup::empty(),
        }
    }

    fn fake_kill(pid: u32, how: Termination) -> SignalOutcome {
        assert_eq!(how, Termination::Forceful);
        if pid == 101 {
            SignalOutcome::Gone
        } else {
            SignalOutcome::Sent
        }
    }

    #[test]
    fn free_counts_only_killed_occupants_and_spares_self() {
        let guard = PortGuard::with_ops(fake_holders, fake_kill);
        // 100 killed, 101 already gone, own pid skipped
        assert_eq!(guard.free(8001), 1);
    }

    #[test]
    fn unavailable_query_reads_as_free() {
        let guard = PortGuard::with_ops(fake_holders, fake_kill);
        assert!(guard.binding(3000).is_free());
        assert_eq!(guard.free(3000), 0);
    }

    #[test]
    fn binding_display_lists_pids() {
        let guard = PortGuard::with_ops(fake_holders, fake_kill);
        let binding = guard.binding(8001);
        assert!(!binding.is_free());
        assert!(binding.to_string().starts_with("Port 8001 is still in use by PID 100, 101"));
    }

    #[test]
    fn real_listener_is_an_occupant() {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let guard = PortGuard::new();
        assert!(guard.occupants_of(port).contains(&std::process::id()));
        // Never kills the supervisor itself.
        assert_eq!(guard.free(port), 0);
    }
}
