use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::config::Project;
use crate::orchestrator::error::SupervisorError;
use crate::orchestrator::launcher::ServiceLauncher;
use crate::orchestrator::service::SupervisorPlan;
use crate::orchestrator::Supervisor;

pub async fn run(project: &Project) -> Result<(), SupervisorError> {
    let plan = SupervisorPlan::for_project(&project.root, &project.config);
    let ports = plan.ports();
    let mut supervisor = Supervisor::new(plan, ServiceLauncher::new(0));

    println!("srrctl cleanup");
    println!("==============");
    println!();

    let actions = supervisor.clean().await?;

    println!();
    let ports: Vec<String> = ports.iter().map(u16::to_string).collect();
    let message = format!(
        "Cleanup complete ({} process(es) stopped), ports {} are free.",
        actions,
        ports.join(" and ")
    );
    if std::io::stdout().is_terminal() {
        println!("{}", message.green());
    } else {
        println!("{}", message);
    }
    Ok(())
}
