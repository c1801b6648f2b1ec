use crate::common::*;
use std::time::Duration;
use tokio::process::Command;

const SHORT_LIVED_BACKEND: &str = r#"
import socket, time
s = socket.socket()
s.setsockopt(socket.SOL_SOCKET, socket.SO_REUSEADDR, 1)
s.bind(("127.0.0.1", 8001))
s.listen()
time.sleep(3)
raise SystemExit(4)
"#;

#[tokio::test]
async fn backend_exit_after_startup_stops_frontend_and_exits_one() {
    let _ports = fixed_ports();
    let project = SrrProject::new(SHORT_LIVED_BACKEND);

    let output = tokio::time::timeout(
        Duration::from_secs(40),
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
    assert!(stderr.contains("backend process died unexpectedly"), "{stderr}");
    assert!(wait_for_port_release(3000, Duration::from_secs(5)).await);
}
