use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use serde::{Deserialize, Serialize};

/// Default maximum number of log lines to keep in memory
pub const DEFAULT_MAX_LOG_LINES: usize = 10000;

pub const SOURCE_SETTINGS: &str = "settings";
pub const SOURCE_UPDATES: &str = "updates";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: String,
    pub timestamp: String,
    pub level: String,
    pub message: String,
    pub source: Option<String>,
}

/// Diagnostic log ring shared by the synchronizers and the hosts.
pub struct LogManager {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    max_lines: usize,
    mirror_to_stderr: bool,
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LOG_LINES)
    }
}

impl LogManager {
    pub fn new(max_lines: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(max_lines.min(1024)))),
            max_lines,
            mirror_to_stderr: false,
        }
    }

    /// Echo warnings and errors to stderr as well (used by the CLI host).
    pub fn with_stderr_mirror(mut self) -> Self {
        self.mirror_to_stderr = true;
        self
    }

    pub fn log(&self, level: &str, message: &str, source: Option<&str>) {
        let now = chrono::Utc::now().to_rfc3339();
        let entry = LogEntry {
            id: now.clone(),
            timestamp: now,
            level: level.to_string(),
            message: message.to_string(),
            source: source.map(str::to_string),
        };

        if self.mirror_to_stderr && matches!(level, "warning" | "error") {
            eprintln!("[{}] {}: {}", source.unwrap_or("harbor"), level, message);
        }

        // A poisoned lock only means another thread panicked mid-push; the ring is still usable.
        let mut logs = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        logs.push_back(entry);

        while logs.len() > self.max_lines {
            logs.pop_front();
        }
    }

    pub fn info(&self, source: &str, message: &str) {
        self.log("info", message, Some(source));
    }

    pub fn warning(&self, source: &str, message: &str) {
        self.log("warning", message, Some(source));
    }

    pub fn error(&self, source: &str, message: &str) {
        self.log("error", message, Some(source));
    }

    pub fn get_logs(&self, source: Option<&str>) -> Vec<LogEntry> {
        let logs = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match source {
            Some(source) => logs
                .iter()
                .filter(|l| l.source.as_deref() == Some(source))
                .cloned()
                .collect(),
            None => logs.iter().cloned().collect(),
        }
    }

    /// Get logs with pagination for better performance with large log sets
    pub fn get_logs_paginated(&self, source: Option<&str>, offset: usize, limit: usize) -> Vec<LogEntry> {
        let filtered = self.get_logs(source);

        let start = offset.min(filtered.len());
        let end = offset.saturating_add(limit).min(filtered.len());

        filtered[start..end].to_vec()
    }
}
