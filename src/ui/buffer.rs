use std::collections::VecDeque;

use crate::ui::logs::LogLine;

/// Ring buffer holding the most recent output lines of one stream.
pub struct LogBuffer {
    lines: VecDeque<LogLine>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Push a log line, evicting the oldest if at capacity.
    pub fn push(&mut self, line: LogLine) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn all(&self) -> Vec<&LogLine> {
        self.lines.iter().collect()
    }

    /// All buffered text, one line per entry.
    pub fn joined(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_line(text: &str) -> LogLine {
        LogLine {
            timestamp: Utc::now(),
            service: "backend".to_string(),
            text: text.to_string(),
            is_stderr: false,
            level: None,
        }
    }

    #[test]
    fn buffer_capacity_eviction() {
        let mut buf = LogBuffer::new(3);
        buf.push(make_line("a"));
        buf.push(make_line("b"));
        buf.push(make_line("c"));
        assert_eq!(buf.len(), 3);

        buf.push(make_line("d"));
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.all()[0].text, "b"); // "a" was evicted
    }

    #[test]
    fn joined_preserves_order() {
        let mut buf = LogBuffer::new(10);
        buf.push(make_line("Traceback (most recent call last):"));
        buf.push(make_line("ModuleNotFoundError: No module named 'fastapi'"));
        assert_eq!(
            buf.joined(),
            "Traceback (most recent call last):\nModuleNotFoundError: No module named 'fastapi'"
        );
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut buf = LogBuffer::new(0);
        buf.push(make_line("dropped"));
        assert!(buf.is_empty());
        assert_eq!(buf.joined(), "");
    }
}
