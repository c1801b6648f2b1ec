use crate::config::Project;
use crate::orchestrator::error::SupervisorError;
use crate::orchestrator::preflight::{DataReport, DependencyReport};
use crate::orchestrator::service::SupervisorPlan;

fn dependency_lines(report: &DependencyReport, libraries: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = libraries
        .iter()
        .map(|library| {
            if report.missing_libraries.contains(library) {
                format!("  [!!] {:<16} not installed", library)
            } else {
                format!("  [ok] {:<16} installed", library)
            }
        })
        .collect();

    if let Some(runtime) = &report.runtime {
        lines.push(match &runtime.version {
            Some(version) => format!("  [ok] {:<16} {}", runtime.name, version),
            None => format!("  [!!] {:<16} not found", runtime.name),
        });
    }
    lines
}

fn data_lines(report: &DataReport, data_files: &[String]) -> Vec<String> {
    data_files
        .iter()
        .map(|file| {
            if report.missing_files.contains(file) {
                format!("  [!!] {} missing", file)
            } else {
                format!("  [ok] {}", file)
            }
        })
        .collect()
}

pub async fn run(project: &Project) -> Result<(), SupervisorError> {
    let plan = SupervisorPlan::for_project(&project.root, &project.config);
    let preflight = &plan.preflight;

    println!("srrctl check");
    println!("============");
    println!();

    let report = preflight.run().await;

    println!("Dependencies:");
    for line in dependency_lines(&report.dependencies, &preflight.libraries) {
        println!("{}", line);
    }
    println!();
    println!("Model files in {}:", report.data.models_dir.display());
    for line in data_lines(&report.data, &preflight.data_files) {
        println!("{}", line);
    }
    println!();

    if report.is_ok() {
        println!("All checks passed.");
        Ok(())
    } else {
        let advice = preflight.advice(&report);
        Err(SupervisorError::Environment { report, advice })
    }
}
