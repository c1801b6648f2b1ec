use std::collections::BTreeSet;
use tokio::process::Command;
use tracing::{debug, warn};

use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;

use super::{Lookup, SignalOutcome, Termination};

pub fn configure_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

fn to_signal(how: Termination) -> Signal {
    match how {
        Termination::Graceful => Signal::SIGTERM,
        Termination::Forceful => Signal::SIGKILL,
    }
}

fn outcome(result: nix::Result<()>) -> SignalOutcome {
    match result {
        Ok(()) => SignalOutcome::Sent,
        Err(Errno::ESRCH) => SignalOutcome::Gone,
        Err(e) => SignalOutcome::Failed(e.to_string()),
    }
}

pub fn signal_process(pid: u32, how: Termination) -> SignalOutcome {
    let result = outcome(kill(Pid::from_raw(pid as i32), to_signal(how)));
    debug!(pid, signal = ?how, result = ?result, "signalled process");
    result
}

pub fn signal_group(pgid: u32, how: Termination) -> SignalOutcome {
    let result = outcome(killpg(Pid::from_raw(pgid as i32), to_signal(how)));
    debug!(pgid, signal = ?how, result = ?result, "signalled process group");
    result
}

pub fn is_process_alive(pid: u32) -> bool {
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

pub async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, waiting for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = term.recv() => "SIGTERM",
    }
}

// ---------------------------------------------------------------------------
// Linux: read the process table and socket tables straight from /proc
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
fn numeric_proc_entries() -> std::io::Result<Vec<u32>> {
    let mut pids = Vec::new();
    for entry in std::fs::read_dir("/proc")?.flatten() {
        if let Ok(pid) = entry.file_name().to_string_lossy().parse::<u32>() {
            pids.push(pid);
        }
    }
    Ok(pids)
}

#[cfg(target_os = "linux")]
pub fn find_by_cmdline(needle: &str) -> Lookup {
    let pids = match numeric_proc_entries() {
        Ok(p) => p,
        Err(e) => return Lookup::Unavailable(format!("reading /proc: {}", e)),
    };

    let me = std::process::id();
    let mut found = BTreeSet::new();
    for pid in pids {
        if pid == me {
            continue;
        }
        // The process may have exited since the directory listing.
        let Ok(raw) = std::fs::read(format!("/proc/{}/cmdline", pid)) else {
            continue;
        };
        let cmdline = String::from_utf8_lossy(&raw).replace('\0', " ");
        let cmdline = cmdline.trim();
        // Kernel threads and zombies have an empty command line.
        if cmdline.is_empty() {
            continue;
        }
        if cmdline.contains(needle) {
            found.insert(pid);
        }
    }
    Lookup::Found(found)
}

/// Socket inodes bound to `port` in one of the /proc/net tables.
#[cfg(target_os = "linux")]
fn socket_inodes(table: &str, port: u16) -> std::io::Result<BTreeSet<String>> {
    let content = std::fs::read_to_string(table)?;
    let port_hex = format!("{:04X}", port);

    let mut inodes = BTreeSet::new();
    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let local_port = fields[1].rsplit(':').next().unwrap_or_default();
        // TIME_WAIT sockets carry inode 0 and belong to nobody.
        if local_port == port_hex && fields[9] != "0" {
            inodes.insert(fields[9].to_string());
        }
    }
    Ok(inodes)
}

#[cfg(target_os = "linux")]
pub fn port_holders(port: u16) -> Lookup {
    let v4 = socket_inodes("/proc/net/tcp", port);
    let v6 = socket_inodes("/proc/net/tcp6", port);

    let mut inodes = BTreeSet::new();
    match (v4, v6) {
        (Err(e), Err(_)) => {
            return Lookup::Unavailable(format!("reading /proc/net/tcp: {}", e));
        }
        (a, b) => {
            inodes.extend(a.unwrap_or_default());
            inodes.extend(b.unwrap_or_default());
        }
    }
    if inodes.is_empty() {
        return Lookup::empty();
    }

    let targets: BTreeSet<String> = inodes
        .iter()
        .map(|inode| format!("socket:[{}]", inode))
        .collect();

    let pids = match numeric_proc_entries() {
        Ok(p) => p,
        Err(e) => return Lookup::Unavailable(format!("reading /proc: {}", e)),
    };

    let mut found = BTreeSet::new();
    for pid in pids {
        // Descriptors of other users' processes are unreadable; skip them.
        let Ok(fds) = std::fs::read_dir(format!("/proc/{}/fd", pid)) else {
            continue;
        };
        for fd in fds.flatten() {
            if let Ok(link) = std::fs::read_link(fd.path()) {
                if targets.contains(link.to_string_lossy().as_ref()) {
                    found.insert(pid);
                    break;
                }
            }
        }
    }
    Lookup::Found(found)
}

// ---------------------------------------------------------------------------
// Other unix hosts: shell out to ps and lsof
// ---------------------------------------------------------------------------

/// Parse one PID per line, ignoring anything that is not a number.
#[cfg_attr(target_os = "linux", allow(dead_code))]
fn parse_pid_lines(output: &str) -> BTreeSet<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}

#[cfg(not(target_os = "linux"))]
pub fn find_by_cmdline(needle: &str) -> Lookup {
    let output = match std::process::Command::new("ps")
        .args(["-axo", "pid=,command="])
        .output()
    {
        Ok(o) if o.status.success() => o,
        Ok(o) => return Lookup::Unavailable(format!("ps exited with {}", o.status)),
        Err(e) => return Lookup::Unavailable(format!("running ps: {}", e)),
    };

    let me = std::process::id();
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut found = BTreeSet::new();
    for line in stdout.lines() {
        let line = line.trim_start();
        let Some((pid, command)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Ok(pid) = pid.parse::<u32>() else {
            continue;
        };
        if pid != me && command.contains(needle) {
            found.insert(pid);
        }
    }
    Lookup::Found(found)
}

#[cfg(not(target_os = "linux"))]
pub fn port_holders(port: u16) -> Lookup {
    let output = match std::process::Command::new("lsof")
        .arg("-ti")
        .arg(format!("tcp:{}", port))
        .output()
    {
        Ok(o) => o,
        Err(e) => return Lookup::Unavailable(format!("running lsof: {}", e)),
    };
    // lsof exits 1 with empty output when nothing matches.
    Lookup::Found(parse_pid_lines(&String::from_utf8_lossy(&output.stdout)))
}
