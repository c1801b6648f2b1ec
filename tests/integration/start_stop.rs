use crate::common::*;
use nix::sys::signal::Signal;
use srrctl::platform;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Run `srrctl start` until both ports are bound, deliver `signal` and
/// check for a clean exit with both ports released.
async fn start_then_stop_with(signal: Signal) {
    let _ports = fixed_ports();
    let project = SrrProject::new(SERVING_BACKEND);

    let mut child = Command::new(env!("CARGO_BIN_EXE_srrctl"))
        .args(["-C", project.root().to_str().unwrap(), "start"])
        .stdout(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("failed to start srrctl");

    assert!(
        wait_for_port(8001, Duration::from_secs(15)).await,
        "backend did not bind 8001"
    );
    assert!(
        wait_for_port(3000, Duration::from_secs(15)).await,
        "frontend did not bind 3000"
    );

    // Only the launched services hold the ports.
    let backend = platform::find_by_cmdline("main.py").into_pids();
    let frontend = platform::find_by_cmdline("http.server 3000").into_pids();
    let on_8001 = platform::port_holders(8001).into_pids();
    let on_3000 = platform::port_holders(3000).into_pids();
    assert!(!on_8001.is_empty() && on_8001.is_subset(&backend), "{on_8001:?} vs {backend:?}");
    assert!(!on_3000.is_empty() && on_3000.is_subset(&frontend), "{on_3000:?} vs {frontend:?}");

    send_signal(child.id().unwrap(), signal);
    let status = tokio::time::timeout(Duration::from_secs(20), child.wait())
        .await
        .expect("srrctl did not shut down")
        .unwrap();
    assert_eq!(status.code(), Some(0), "exit after {signal}");

    assert!(wait_for_port_release(8001, Duration::from_secs(5)).await);
    assert!(wait_for_port_release(3000, Duration::from_secs(5)).await);
}

#[tokio::test]
async fn start_then_interrupt_exits_zero_and_frees_ports() {
    start_then_stop_with(Signal::SIGINT).await;
}

#[tokio::test]
async fn start_then_terminate_exits_zero_and_frees_ports() {
    start_then_stop_with(Signal::SIGTERM).await;
}

#[tokio::test]
async fn backend_that_dies_at_startup_aborts_before_frontend() {
    let _ports = fixed_ports();
    let project = SrrProject::new("import sys\nprint('boom', file=sys.stderr)\nsys.exit(2)\n");

    let output = tokio::time::timeout(
        Duration::from_secs(30),
        Command::new(env!("CARGO_BIN_EXE_srrctl"))
            .args(["-C", project.root().to_str().unwrap(), "start"])
            .kill_on_drop(true)
            .output(),
    )
    .await
    .expect("srrctl did not exit")
    .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("backend failed to start"), "{stderr}");
    assert!(stderr.contains("STDERR: boom"), "{stderr}");
    // The frontend was never launched.
    assert!(wait_for_port_release(3000, Duration::from_secs(1)).await);
}
