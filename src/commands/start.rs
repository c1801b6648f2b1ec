use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Project;
use crate::orchestrator::error::SupervisorError;
use crate::orchestrator::launcher::ServiceLauncher;
use crate::orchestrator::service::SupervisorPlan;
use crate::orchestrator::Supervisor;
use crate::platform;
use crate::ui::logs::LogWriter;

/// Width of the service name column in streamed output.
const NAME_WIDTH: usize = 8;

/// How long to let the log writer flush once the services are gone.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn run(project: &Project) -> Result<(), SupervisorError> {
    let plan = SupervisorPlan::for_project(&project.root, &project.config);

    let (log_tx, log_rx) = mpsc::channel(1024);
    let writer = tokio::spawn(LogWriter::new(log_rx, NAME_WIDTH).run());

    let launcher = ServiceLauncher::new(project.config.timing.output_lines).with_log_sink(log_tx);
    let mut supervisor = Supervisor::new(plan, launcher);

    let token = supervisor.cancel_token();
    let signals = tokio::spawn(async move {
        let signal = platform::shutdown_signal().await;
        eprintln!("\nReceived {}, shutting down...", signal);
        token.cancel();
    });

    let result = supervisor.start().await;
    signals.abort();

    // Output readers that outlived their child still hold senders.
    drop(supervisor);
    if tokio::time::timeout(FLUSH_TIMEOUT, writer).await.is_err() {
        debug!("log writer still had open senders");
    }
    result
}
