use clap::{Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "srrctl",
    version,
    about = "Start, check and clean up the local SRR backend and frontend"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Project root (defaults to the config file's directory, then the current directory)
    #[arg(short = 'C', long = "root", global = true, env = "SRRCTL_ROOT")]
    pub root: Option<PathBuf>,

    /// Use a specific config file
    #[arg(short = 'f', long = "file", global = true)]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Clean up, check, launch both services and supervise them (default)
    Start,
    /// Check Python libraries, Node.js and model files
    Check,
    /// Stop stale instances and free ports 8001 and 3000
    Cleanup,
}

impl Cli {
    /// The subcommand to run; `start` when none was given.
    pub fn action(&self) -> Commands {
        self.command.unwrap_or(Commands::Start)
    }
}

/// Lower-case the subcommand name so `START` and `Check` are accepted.
///
/// Only the first argument after the program name is touched, and only
/// when it is not a flag.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if let Some(first) = args.get_mut(1) {
        if let Some(text) = first.to_str() {
            if !text.starts_with('-') {
                *first = OsString::from(text.to_lowercase());
            }
        }
    }
    args
}
