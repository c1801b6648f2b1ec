use chrono::{DateTime, Utc};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use regex::Regex;
use std::sync::LazyLock;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// LogLevel: detected from log line text
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

static LOG_LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(trace|debug|info|warn(?:ing)?|error|critical|traceback)\b"#)
        .expect("log level regex must compile")
});

/// Detect log level from a line of text.
///
/// Python tracebacks and `CRITICAL` records count as errors.
pub fn detect_log_level(text: &str) -> Option<LogLevel> {
    LOG_LEVEL_RE.find(text).and_then(|m| {
        let s = m.as_str().to_lowercase();
        match s.as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" | "critical" | "traceback" => Some(LogLevel::Error),
            _ => None,
        }
    })
}

// ---------------------------------------------------------------------------
// LogLine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub text: String,
    pub is_stderr: bool,
    pub level: Option<LogLevel>,
}

impl LogLine {
    pub fn new(service: &str, text: String, is_stderr: bool) -> Self {
        let level = detect_log_level(&text);
        Self {
            timestamp: Utc::now(),
            service: service.to_string(),
            text,
            is_stderr,
            level,
        }
    }
}

// ---------------------------------------------------------------------------
// LogWriter: prefixed terminal output for child processes
// ---------------------------------------------------------------------------

pub struct LogWriter {
    rx: mpsc::Receiver<LogLine>,
    max_name_len: usize,
    use_color: bool,
}

fn format_level(level: &LogLevel, use_color: bool) -> String {
    if !use_color {
        return format!("{:>5} ", level.as_str());
    }
    match level {
        LogLevel::Trace => format!("{} ", level.as_str().dimmed()),
        LogLevel::Debug => format!("{} ", level.as_str().blue()),
        LogLevel::Info => format!("{} ", level.as_str().green()),
        LogLevel::Warn => format!("{} ", level.as_str().yellow()),
        LogLevel::Error => format!("{} ", level.as_str().red()),
    }
}

fn color_name(service: &str) -> String {
    match service {
        "backend" => format!("{}", service.cyan()),
        "frontend" => format!("{}", service.magenta()),
        _ => format!("{}", service.yellow()),
    }
}

impl LogWriter {
    pub fn new(rx: mpsc::Receiver<LogLine>, max_name_len: usize) -> Self {
        Self {
            rx,
            max_name_len,
            use_color: std::io::stdout().is_terminal(),
        }
    }

    /// Print lines until every sender has been dropped.
    pub async fn run(mut self) {
        while let Some(line) = self.rx.recv().await {
            println!("{}", self.render(&line));
        }
    }

    fn render(&self, line: &LogLine) -> String {
        let mut buf = String::new();

        if self.use_color {
            let padding = self.max_name_len.saturating_sub(line.service.len());
            buf.push_str(&" ".repeat(padding));
            buf.push_str(&color_name(&line.service));
            buf.push_str(&format!(" {} ", "|".dimmed()));
        } else {
            buf.push_str(&format!(
                "{:>width$} | ",
                line.service,
                width = self.max_name_len,
            ));
        }

        if let Some(ref level) = line.level {
            buf.push_str(&format_level(level, self.use_color));
        }

        if self.use_color && line.is_stderr {
            buf.push_str(&format!("{}", line.text.red()));
        } else {
            buf.push_str(&line.text);
        }
        buf
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
