pub mod model;
pub mod resolve;

use std::path::{Path, PathBuf};

use anyhow::Context;
use model::SrrConfig;

pub fn load_config(path: &Path) -> anyhow::Result<SrrConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: SrrConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

/// A project root plus the settings that apply to it.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: SrrConfig,
    pub config_path: Option<PathBuf>,
}

impl Project {
    /// Locate the project from CLI flags.
    ///
    /// The root is `cli_root` when given, else the directory holding the
    /// config file, else the current directory.
    pub fn discover(cli_root: Option<&Path>, cli_file: Option<&Path>) -> anyhow::Result<Self> {
        let cwd = std::env::current_dir().context("reading current directory")?;
        let start = cli_root.map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
        let config_path = resolve::resolve_config(cli_file, &start)?;

        let config = match &config_path {
            Some(path) => load_config(path)?,
            None => SrrConfig::default(),
        };

        let root = match (cli_root, &config_path) {
            (Some(root), _) => root.to_path_buf(),
            (None, Some(path)) => path.parent().map(Path::to_path_buf).unwrap_or(cwd),
            (None, None) => cwd,
        };

        Ok(Self {
            root,
            config,
            config_path,
        })
    }
}
