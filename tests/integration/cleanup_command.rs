use crate::common::*;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

#[tokio::test]
async fn cleanup_frees_squatted_port_and_is_idempotent() {
    let _ports = fixed_ports();
    let dir = tempfile::TempDir::new().unwrap();

    let mut squatter = Command::new("python3")
        .args(["-m", "http.server", "3000", "--bind", "127.0.0.1"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("python3 is required");
    assert!(wait_for_port(3000, Duration::from_secs(10)).await);

    let first = Command::new(env!("CARGO_BIN_EXE_srrctl"))
        .args(["-C", dir.path().to_str().unwrap(), "cleanup"])
        .output()
        .await
        .unwrap();
    assert_eq!(first.status.code(), Some(0), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(String::from_utf8_lossy(&first.stdout).contains("Cleanup complete"));

    let exit = tokio::time::timeout(Duration::from_secs(5), squatter.wait())
        .await
        .expect("squatter was not killed")
        .unwrap();
    assert!(!exit.success());
    assert!(wait_for_port_release(3000, Duration::from_secs(5)).await);

    let second = Command::new(env!("CARGO_BIN_EXE_srrctl"))
        .args(["-C", dir.path().to_str().unwrap(), "cleanup"])
        .output()
        .await
        .unwrap();
    assert_eq!(second.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(stdout.contains("no existing processes"), "{stdout}");
    assert!(stdout.contains("(0 process(es) stopped)"), "{stdout}");
}
