use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio::sync::watch;

use crate::orchestrator::state::ExitInfo;

/// How the launcher decides that a freshly spawned child came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessProbe {
    /// Wait a fixed delay, then succeed if the child is still alive.
    Delay(Duration),
    /// Retry a TCP connect to the port until it succeeds or `timeout` expires.
    Tcp { port: u16, timeout: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Exited(ExitInfo),
    TimedOut(Duration),
}

impl ReadinessProbe {
    pub fn window(&self) -> Duration {
        match self {
            ReadinessProbe::Delay(d) => *d,
            ReadinessProbe::Tcp { timeout, .. } => *timeout,
        }
    }

    /// Wait for the child to become ready. An exit observed on `exit` at any
    /// point inside the window is reported as `Exited`.
    pub async fn wait(&self, exit: &mut watch::Receiver<Option<ExitInfo>>) -> Readiness {
        match self {
            ReadinessProbe::Delay(delay) => {
                tokio::select! {
                    _ = tokio::time::sleep(*delay) => {}
                    info = exited(exit) => return Readiness::Exited(info),
                }
            }
            ReadinessProbe::Tcp { port, timeout } => {
                let probe = tokio::time::timeout(*timeout, tcp_ready(*port));
                tokio::select! {
                    result = probe => {
                        if result.is_err() {
                            return Readiness::TimedOut(*timeout);
                        }
                    }
                    info = exited(exit) => return Readiness::Exited(info),
                }
            }
        }

        let current = exit.borrow().clone();
        match current {
            Some(info) => Readiness::Exited(info),
            None => Readiness::Ready,
        }
    }
}

/// Resolve once the exit watch reports an exit. Never resolves if the
/// sender is dropped without reporting one.
pub(crate) async fn exited(exit: &mut watch::Receiver<Option<ExitInfo>>) -> ExitInfo {
    let current = match exit.wait_for(Option::is_some).await {
        Ok(value) => value.clone(),
        Err(_) => None,
    };
    match current {
        Some(info) => info,
        None => std::future::pending().await,
    }
}

async fn tcp_ready(port: u16) {
    let connect = || async {
        tokio::net::TcpStream::connect(("127.0.0.1", port))
            .await
            .map(|_| ())
    };
    let result = connect
        .retry(
            ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(1))
                .with_max_times(usize::MAX)
                .with_jitter(),
        )
        .notify(|err: &std::io::Error, dur: Duration| {
            tracing::debug!(port, "ready check failed: {}, retrying in {:?}", err, dur);
        })
        .await;
    if result.is_err() {
        // Retries are unbounded; the caller's timeout ends the probe.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn exit_info(code: i32) -> ExitInfo {
        ExitInfo {
            code: Some(code),
            detail: format!("exit status: {}", code),
        }
    }

    #[tokio::test]
    async fn delay_succeeds_while_alive() {
        let (_tx, mut rx) = watch::channel(None);
        let probe = ReadinessProbe::Delay(Duration::from_millis(50));
        assert_eq!(probe.wait(&mut rx).await, Readiness::Ready);
    }

    #[tokio::test]
    async fn delay_reports_early_exit_without_waiting_full_window() {
        let (tx, mut rx) = watch::channel(None);
        tx.send_replace(Some(exit_info(2)));
        let probe = ReadinessProbe::Delay(Duration::from_secs(30));

        let started = Instant::now();
        assert_eq!(probe.wait(&mut rx).await, Readiness::Exited(exit_info(2)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn tcp_probe_succeeds_on_listening_port() {
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (_tx, mut rx) = watch::channel(None);

        let probe = ReadinessProbe::Tcp {
            port,
            timeout: Duration::from_secs(5),
        };
        assert_eq!(probe.wait(&mut rx).await, Readiness::Ready);
    }

    #[tokio::test]
    async fn tcp_probe_times_out_on_closed_port() {
        let port = {
            let l = std::net::TcpListener::bind(("127.0.0.1", 0)).unwrap();
            l.local_addr().unwrap().port()
        };
        let (_tx, mut rx) = watch::channel(None);

        let probe = ReadinessProbe::Tcp {
            port,
            timeout: Duration::from_millis(300),
        };
        assert_eq!(
            probe.wait(&mut rx).await,
            Readiness::TimedOut(Duration::from_millis(300))
        );
    }
}
