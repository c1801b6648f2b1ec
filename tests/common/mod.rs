#![allow(dead_code)]
use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// The services always bind 8001 and 3000, so tests using them take turns.
static FIXED_PORTS: Mutex<()> = Mutex::new(());

pub fn fixed_ports() -> MutexGuard<'static, ()> {
    FIXED_PORTS.lock().unwrap_or_else(|e| e.into_inner())
}

pub const MODEL_FILES: &[&str] = &[
    "ai_models/training_data.pkl",
    "mapping_rules/slope_location_mapping.json",
    "config/srr_rules.json",
    "config/keyword_rules.json",
    "metadata.json",
];

/// A backend that serves HTTP on 8001 until it is stopped.
pub const SERVING_BACKEND: &str = r#"
import http.server
http.server.HTTPServer(("127.0.0.1", 8001), http.server.SimpleHTTPRequestHandler).serve_forever()
"#;

/// A throwaway SRR checkout: a backend `main.py`, a frontend started with
/// `sh start` in place of `npm start`, every model file, and a python
/// wrapper that pretends every library import succeeds.
pub struct SrrProject {
    pub dir: TempDir,
}

impl SrrProject {
    pub fn new(backend_main: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let python = root.join("bin/python");
        write(
            &python,
            "#!/bin/sh\nif [ \"$1\" = \"-c\" ]; then exit 0; fi\nexec python3 \"$@\"\n",
        );
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();

        write(&root.join("src/api/main.py"), backend_main);
        write(
            &root.join("frontend/srr-chatbot/start"),
            "exec python3 -m http.server 3000 --bind 127.0.0.1\n",
        );
        std::fs::create_dir_all(root.join("frontend/srr-chatbot/node_modules")).unwrap();
        for file in MODEL_FILES {
            write(&root.join("models").join(file), "{}");
        }

        write(
            &root.join("srrctl.toml"),
            &format!(
                r#"
[timing]
settle = "500ms"
backend_ready = "1s"
frontend_ready = "1s"
grace = "2s"
monitor_interval = "500ms"

[runtime]
python = "{}"
node = "echo"
npm = "sh"
"#,
                python.display()
            ),
        );
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

fn write(path: &PathBuf, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub async fn wait_for_port(port: u16, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub async fn wait_for_port_release(port: u16, timeout: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if TcpListener::bind(("127.0.0.1", port)).is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

pub fn send_signal(pid: u32, signal: nix::sys::signal::Signal) {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal).ok();
}
