use clap::error::ErrorKind;
use clap::Parser;
use srrctl::cli::{normalize_args, Cli, Commands};
use srrctl::commands;
use srrctl::config::Project;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env-filter support.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            std::process::exit(code);
        }
    };

    let project = match Project::discover(cli.global.root.as_deref(), cli.global.config_file.as_deref()) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    tracing::debug!(
        root = %project.root.display(),
        config = ?project.config_path,
        "project resolved"
    );

    let result = match cli.action() {
        Commands::Start => commands::start::run(&project).await,
        Commands::Check => commands::check::run(&project).await,
        Commands::Cleanup => commands::cleanup::run(&project).await,
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        std::process::exit(1);
    }
}
