use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;

use crate::orchestrator::scanner::ProcessRecord;
use crate::orchestrator::service::{ServiceKind, SupervisorPlan};
use crate::orchestrator::state::{ServiceStatus, SupervisorState};

fn status_cell(status: ServiceStatus, use_color: bool) -> String {
    if !use_color {
        return format!("\u{25cf} {}", status);
    }
    let text = status.as_str();
    match status {
        ServiceStatus::Running => format!("{} {}", "\u{25cf}".green(), text.green()),
        ServiceStatus::Starting | ServiceStatus::Stopping => {
            format!("{} {}", "\u{25cf}".yellow(), text.yellow())
        }
        ServiceStatus::Failed => format!("{} {}", "\u{25cf}".red(), text.red()),
        _ => format!("\u{25cf} {}", text),
    }
}

/// Table rows for the startup summary: service, URL, PID, status.
pub fn summary_rows(state: &SupervisorState, plan: &SupervisorPlan) -> Vec<[String; 4]> {
    ServiceKind::STARTUP_ORDER
        .iter()
        .map(|&kind| {
            let pid = state
                .handle(kind)
                .map(|h| h.pid().to_string())
                .unwrap_or_else(|| "-".to_string());
            [
                kind.to_string(),
                plan.spec(kind).url(),
                pid,
                state.status(kind).to_string(),
            ]
        })
        .collect()
}

pub fn print_startup_summary(state: &SupervisorState, plan: &SupervisorPlan) {
    let use_color = std::io::stdout().is_terminal();

    println!();
    if use_color {
        println!("  {} {}", "srrctl".bold(), "SRR system running".cyan());
    } else {
        println!("  srrctl SRR system running");
    }
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Service").set_alignment(CellAlignment::Left),
        Cell::new("URL").set_alignment(CellAlignment::Left),
        Cell::new("PID").set_alignment(CellAlignment::Right),
        Cell::new("Status").set_alignment(CellAlignment::Center),
    ]);

    for (kind, row) in ServiceKind::STARTUP_ORDER.iter().zip(summary_rows(state, plan)) {
        let [name, url, pid, _] = row;
        table.add_row(vec![
            Cell::new(name),
            Cell::new(url),
            Cell::new(pid),
            Cell::new(status_cell(state.status(*kind), use_color)),
        ]);
    }

    // Indent the table by 2 spaces
    for line in table.to_string().lines() {
        println!("  {}", line);
    }

    println!();
    println!("  API docs: {}/docs", plan.backend.url());
    println!();
    if use_color {
        println!("  Press {} to stop", "Ctrl+C".bold());
    } else {
        println!("  Press Ctrl+C to stop");
    }
    println!();
}

/// List stale instances found before cleaning.
pub fn print_conflicts(records: &[ProcessRecord]) {
    let use_color = std::io::stdout().is_terminal();
    if records.is_empty() {
        println!("  no existing processes");
        return;
    }
    if use_color {
        println!("  {}", "Found existing processes:".yellow());
    } else {
        println!("  Found existing processes:");
    }
    for record in records {
        println!("    - {}", record);
    }
}
