use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Severity tag attached to every log entry, with a fixed line marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    Progress,
}

impl LogLevel {
    pub fn marker(&self) -> &'static str {
        match self {
            LogLevel::Info => "*",
            LogLevel::Success => "+",
            LogLevel::Warn => "!",
            LogLevel::Error => "x",
            LogLevel::Progress => ">",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub elapsed: Duration,
    pub level: LogLevel,
    pub message: String,
    pub payload: Option<Value>,
}

impl LogEntry {
    /// Line-oriented sink format: `[elapsed] [marker] message`.
    pub fn format_line(&self) -> String {
        format!(
            "[{:>6.1}s] [{}] {}",
            self.elapsed.as_secs_f64(),
            self.level.marker(),
            self.message
        )
    }
}

type Listener = Box<dyn Fn(&LogEntry) + Send + Sync>;

/// Append-only, process-lifetime event log with synchronous listener
/// fan-out. A panicking listener is isolated so it cannot block delivery
/// to the remaining listeners or fail the emitting call.
pub struct EventLog {
    started: Instant,
    entries: Mutex<Vec<LogEntry>>,
    listeners: Mutex<Vec<Listener>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            entries: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&LogEntry) + Send + Sync + 'static) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message.into(), None);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(LogLevel::Success, message.into(), None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(LogLevel::Warn, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(LogLevel::Error, message.into(), None);
    }

    /// Percent-style update rendered as an ASCII bar.
    pub fn progress(&self, percent: f64, label: &str) {
        let message = format!("{} {}", progress_bar(percent, 20), label);
        self.emit(LogLevel::Progress, message, None);
    }

    pub fn emit(&self, level: LogLevel, message: String, payload: Option<Value>) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            elapsed: self.started.elapsed(),
            level,
            message,
            payload,
        };

        match level {
            LogLevel::Warn => tracing::warn!("{}", entry.message),
            LogLevel::Error => tracing::error!("{}", entry.message),
            _ => tracing::info!("{}", entry.message),
        }

        {
            let listeners = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            for listener in listeners.iter() {
                if catch_unwind(AssertUnwindSafe(|| listener(&entry))).is_err() {
                    tracing::warn!("event listener panicked; continuing delivery");
                }
            }
        }

        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `[#####-----] 50%` for a clamped percentage.
pub fn progress_bar(percent: f64, width: usize) -> String {
    let clamped = percent.clamp(0.0, 100.0);
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    format!(
        "[{}{}] {:.0}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        clamped
    )
}
