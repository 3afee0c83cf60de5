//! # Logging
//!
//! Process-wide subscriber setup plus the [`StageLog`] capability handed to
//! each stage. Stages never reach for a global logger directly, so tests can
//! swap in [`MemoryLog`] and inspect what a stage reported.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Install the console layer and, when `log_file` can be opened, a file layer
/// appending timestamped lines to it.
pub fn init_logging(log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    let file_layer = log_file.and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).ok()?;
        Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init();
}

/// Logging capability passed into every stage.
pub trait StageLog {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

impl<T: StageLog + ?Sized> StageLog for std::sync::Arc<T> {
    fn info(&self, message: &str) {
        (**self).info(message);
    }

    fn warn(&self, message: &str) {
        (**self).warn(message);
    }

    fn error(&self, message: &str) {
        (**self).error(message);
    }
}

/// Forwards to `tracing`, tagging each event with the stage name.
#[derive(Debug, Clone, Copy)]
pub struct TracingLog {
    stage: &'static str,
}

impl TracingLog {
    pub fn new(stage: &'static str) -> Self {
        Self { stage }
    }
}

impl StageLog for TracingLog {
    fn info(&self, message: &str) {
        info!(stage = self.stage, "{message}");
    }

    fn warn(&self, message: &str) {
        warn!(stage = self.stage, "{message}");
    }

    fn error(&self, message: &str) {
        error!(stage = self.stage, "{message}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.lines().iter().filter(|(l, _)| *l == level).count()
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

impl StageLog for MemoryLog {
    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_keeps_order_and_levels() {
        let log = MemoryLog::new();
        log.info("loaded");
        log.warn("skipped missing file");
        log.error("boom");
        let lines = log.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], (LogLevel::Warn, "skipped missing file".to_string()));
        assert_eq!(log.count(LogLevel::Error), 1);
    }
}
