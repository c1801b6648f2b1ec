use tracing::{debug, warn};

use crate::orchestrator::service::{Pattern, ProcessKind};
use crate::platform::{self, Lookup};

/// A running OS process that matched one of the conflict patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub kind: ProcessKind,
    pub pid: u32,
    pub matched_pattern: String,
    pub label: String,
}

impl std::fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (PID: {}) - {}", self.label, self.pid, self.matched_pattern)
    }
}

/// Finds processes by substring match against their command line.
#[derive(Clone)]
pub struct ProcessScanner {
    query: fn(&str) -> Lookup,
}

impl Default for ProcessScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessScanner {
    pub fn new() -> Self {
        Self {
            query: platform::find_by_cmdline,
        }
    }

    /// Use a custom process-table query.
    pub fn with_query(query: fn(&str) -> Lookup) -> Self {
        Self { query }
    }

    /// One record per (pattern, matching process), in pattern order.
    ///
    /// A failed query for a pattern counts as no matches for it.
    pub fn find_processes(&self, patterns: &[Pattern]) -> Vec<ProcessRecord> {
        let mut records = Vec::new();
        for pattern in patterns {
            match (self.query)(&pattern.needle) {
                Lookup::Found(pids) => {
                    debug!(pattern = %pattern.needle, matches = pids.len(), "scanned process table");
                    records.extend(pids.into_iter().map(|pid| ProcessRecord {
                        kind: pattern.kind,
                        pid,
                        matched_pattern: pattern.needle.clone(),
                        label: pattern.label.clone(),
                    }));
                }
                Lookup::Unavailable(reason) => {
                    warn!(pattern = %pattern.needle, %reason, "process query failed, treating as no matches");
                }
            }
        }
        records
    }
}

impl std::fmt::Debug for ProcessScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessScanner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn fake_query(needle: &str) -> Lookup {
        match needle {
            "main.py" => Lookup::Found(BTreeSet::from([41, 42])),
            "react-scripts" => Lookup::Unavailable("permission denied".into()),
            _ => Lookup::empty(),
        }
    }

    #[test]
    fn records_are_tagged_with_pattern_kind() {
        let scanner = ProcessScanner::with_query(fake_query);
        let records = scanner.find_processes(&[
            Pattern::new(ProcessKind::Backend, "main.py", "Python Backend"),
            Pattern::new(ProcessKind::Other, "npm start", "NPM Start"),
        ]);

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == ProcessKind::Backend));
        assert_eq!(records[0].pid, 41);
        assert_eq!(records[0].to_string(), "Python Backend (PID: 41) - main.py");
    }

    #[test]
    fn failed_query_is_swallowed() {
        let scanner = ProcessScanner::with_query(fake_query);
        let records = scanner.find_processes(&[
            Pattern::new(ProcessKind::Frontend, "react-scripts", "React Frontend"),
            Pattern::new(ProcessKind::Backend, "main.py", "Python Backend"),
        ]);
        // The unavailable pattern yields nothing but does not stop the scan.
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.matched_pattern == "main.py"));
    }

    #[tokio::test]
    async fn finds_real_process_by_substring() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("7302")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();
        // Give exec a moment to replace the command line.
        tokio::time::sleep(Duration::from_millis(100)).await;

        let records = ProcessScanner::new().find_processes(&[Pattern::new(
            ProcessKind::Backend,
            "sleep 7302",
            "sleeper",
        )]);
        assert!(
            records.iter().any(|r| r.pid == pid),
            "expected pid {} in {:?}",
            pid,
            records
        );

        child.kill().await.unwrap();
    }
}
