use serde::{de, Deserialize, Deserializer};
use std::time::Duration;

/// Contents of an `srrctl.toml` file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SrrConfig {
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

fn default_settle() -> Duration {
    Duration::from_secs(3)
}

fn default_backend_ready() -> Duration {
    Duration::from_secs(3)
}

fn default_frontend_ready() -> Duration {
    Duration::from_secs(10)
}

fn default_grace() -> Duration {
    Duration::from_secs(5)
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_output_lines() -> usize {
    500
}

/// Fixed waits used during cleanup, startup and shutdown.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TimingConfig {
    /// Pause after issuing terminations, before re-verifying cleanup.
    #[serde(default = "default_settle", deserialize_with = "duration")]
    pub settle: Duration,
    #[serde(default = "default_backend_ready", deserialize_with = "duration")]
    pub backend_ready: Duration,
    #[serde(default = "default_frontend_ready", deserialize_with = "duration")]
    pub frontend_ready: Duration,
    /// Wait after SIGTERM before escalating to SIGKILL.
    #[serde(default = "default_grace", deserialize_with = "duration")]
    pub grace: Duration,
    #[serde(default = "default_monitor_interval", deserialize_with = "duration")]
    pub monitor_interval: Duration,
    /// Lines of stdout/stderr kept per service.
    #[serde(default = "default_output_lines")]
    pub output_lines: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle: default_settle(),
            backend_ready: default_backend_ready(),
            frontend_ready: default_frontend_ready(),
            grace: default_grace(),
            monitor_interval: default_monitor_interval(),
            output_lines: default_output_lines(),
        }
    }
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_node() -> String {
    "node".to_string()
}

fn default_npm() -> String {
    "npm".to_string()
}

/// Executables used to run and probe the two services.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default = "default_node")]
    pub node: String,
    #[serde(default = "default_npm")]
    pub npm: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            python: default_python(),
            node: default_node(),
            npm: default_npm(),
        }
    }
}

/// Deserialize a human-readable duration such as `"3s"` or `"500ms"`.
fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    struct DurationVisitor;

    impl<'de> de::Visitor<'de> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a duration such as \"3s\" or \"500ms\"")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
            humantime::parse_duration(v)
                .map_err(|e| E::custom(format!("invalid duration \"{v}\": {e}")))
        }
    }

    deserializer.deserialize_str(DurationVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: SrrConfig = toml::from_str("").unwrap();
        assert_eq!(config, SrrConfig::default());
        assert_eq!(config.timing.settle, Duration::from_secs(3));
        assert_eq!(config.timing.backend_ready, Duration::from_secs(3));
        assert_eq!(config.timing.frontend_ready, Duration::from_secs(10));
        assert_eq!(config.timing.grace, Duration::from_secs(5));
        assert_eq!(config.timing.monitor_interval, Duration::from_secs(5));
        assert_eq!(config.runtime.python, "python3");
    }

    #[test]
    fn partial_timing_keeps_other_defaults() {
        let config: SrrConfig = toml::from_str(
            r#"
[timing]
grace = "2s"
monitor_interval = "250ms"
"#,
        )
        .unwrap();
        assert_eq!(config.timing.grace, Duration::from_secs(2));
        assert_eq!(config.timing.monitor_interval, Duration::from_millis(250));
        assert_eq!(config.timing.settle, Duration::from_secs(3));
    }

    #[test]
    fn runtime_overrides() {
        let config: SrrConfig = toml::from_str(
            r#"
[runtime]
python = "/opt/venv/bin/python"
"#,
        )
        .unwrap();
        assert_eq!(config.runtime.python, "/opt/venv/bin/python");
        assert_eq!(config.runtime.npm, "npm");
    }

    #[test]
    fn invalid_duration_rejected() {
        let err = toml::from_str::<SrrConfig>(
            r#"
[timing]
settle = "soon"
"#,
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("invalid duration"),
            "unexpected error: {}",
            err
        );
    }
}
