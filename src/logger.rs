//! Structured logging for netsentry.
//!
//! Provides a [`Logger`] that writes events to stdout and optionally to a
//! log file. Output can be formatted as human-readable plain text or as
//! newline-delimited JSON (NDJSON), making it easy to ingest into log
//! shippers and SIEM platforms.
//!
//! All public functions are intentionally cheap; they take a shared
//! reference to the logger and do a single allocation per event for the
//! formatted string. Events below the configured minimum level are
//! discarded before any formatting happens.

use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::{Arc, Mutex};

// ── Log levels ───────────────────────────────────────────────────────────────

/// Minimum-severity filter applied to every event before output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parses the `log_level` config value. Unknown strings fall back to
    /// `Info` so a typo in the config never silences the agent entirely.
    pub fn from_config(value: &str) -> Self {
        match value {
            "debug" | "trace" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warning" | "warn" => LogLevel::Warning,
            "error" | "critical" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ── Event types ──────────────────────────────────────────────────────────────

/// All distinct event kinds that netsentry can emit.
///
/// Each variant carries exactly the fields needed to describe that event.
/// The `#[serde(tag = "event")]` attribute ensures JSON output includes an
/// `"event"` key so consumers can filter by type without inspecting
/// structure.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    /// Informational startup / status message.
    Info { message: &'a str },

    /// Unrecoverable failure; the process is about to exit.
    Error { message: &'a str },

    /// A collector task began its sampling loop.
    CollectorStarted { name: &'a str, interval_ms: u64 },

    /// Live capture started on an interface.
    CaptureStarted { interface: &'a str },

    /// Capture could not be started; the rest of the agent keeps running.
    CaptureFailed { interface: &'a str, error: &'a str },

    /// An alert rule's condition held and its cooldown had elapsed.
    AlertFired {
        name:        &'a str,
        severity:    &'a str,
        description: &'a str,
    },

    /// An alert callback returned an error; later callbacks still ran.
    CallbackFailed { rule: &'a str, error: &'a str },

    /// The write-behind store rejected a batch. Never retried.
    StoreFailed { kind: &'a str, error: &'a str },

    /// Session summary emitted on graceful shutdown.
    SessionSummary {
        duration_secs:    u64,
        packets_captured: u64,
        packets_dropped:  u64,
        flows_tracked:    u64,
        alerts_emitted:   u64,
    },
}

impl Event<'_> {
    /// Severity used for level filtering.
    fn level(&self) -> LogLevel {
        match self {
            Event::Info { .. }
            | Event::CollectorStarted { .. }
            | Event::CaptureStarted { .. }
            | Event::SessionSummary { .. } => LogLevel::Info,
            Event::CaptureFailed { .. } | Event::AlertFired { .. } => LogLevel::Warning,
            Event::Error { .. } | Event::CallbackFailed { .. } | Event::StoreFailed { .. } => {
                LogLevel::Error
            }
        }
    }
}

// ── Logger ───────────────────────────────────────────────────────────────────

/// Shared, thread-safe structured logger.
///
/// Constructed once in `main` and passed as an `Arc<Logger>` to every
/// subsystem that needs to emit events. The internal `Mutex` serialises
/// file writes so that output lines are never interleaved across threads.
pub struct Logger {
    /// Whether to format events as NDJSON instead of plain text.
    json:      bool,
    /// Events below this level are discarded.
    min_level: LogLevel,
    /// Optional buffered file writer. `None` when no log file is in use.
    file:      Option<Mutex<BufWriter<std::fs::File>>>,
}

/// Type alias used throughout the codebase for convenience.
pub type SharedLogger = Arc<Logger>;

impl Logger {
    /// Creates a new logger.
    ///
    /// # Arguments
    /// * `json`      - Emit NDJSON instead of plain text when `true`.
    /// * `log_path`  - If `Some`, open (or create) this file for appended writes.
    /// * `min_level` - Events below this level are dropped.
    ///
    /// # Errors
    /// Returns an `io::Error` if the log file cannot be opened or created.
    pub fn new(json: bool, log_path: Option<&str>, min_level: LogLevel) -> io::Result<Self> {
        let file = match log_path {
            Some(path) => {
                let f = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(BufWriter::new(f)))
            }
            None => None,
        };

        Ok(Self { json, min_level, file })
    }

    /// Logs a single [`Event`], writing to stdout and optionally to the
    /// log file.
    ///
    /// Plain-text output is prefixed with a timestamp and the event tag.
    /// NDJSON output is a single JSON object per line with a `"timestamp"`
    /// field injected alongside the event fields.
    pub fn log(&self, event: &Event) {
        if event.level() < self.min_level {
            return;
        }

        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();

        let line = if self.json {
            // Serialise the event to a JSON Value so we can inject the timestamp.
            let mut val = serde_json::to_value(event).unwrap_or_default();
            if let Some(obj) = val.as_object_mut() {
                obj.insert(
                    "timestamp".to_string(),
                    serde_json::Value::String(timestamp.clone()),
                );
            }
            serde_json::to_string(&val).unwrap_or_default()
        } else {
            format!("[{}] {}", timestamp, self.plain_text(event))
        };

        // Always write to stdout.
        println!("{}", line);

        // If a log file was configured, also write there.
        if let Some(mutex) = &self.file {
            if let Ok(mut writer) = mutex.lock() {
                let _ = writeln!(writer, "{}", line);
                let _ = writer.flush();
            }
        }
    }

    /// Formats an [`Event`] as a human-readable plain-text string
    /// (no timestamp).
    fn plain_text(&self, event: &Event) -> String {
        match event {
            Event::Info { message } =>
                format!("[INFO] {}", message),

            Event::Error { message } =>
                format!("[ERROR] {}", message),

            Event::CollectorStarted { name, interval_ms } =>
                format!("[COLLECTOR] {} started, interval {}ms", name, interval_ms),

            Event::CaptureStarted { interface } =>
                format!("[CAPTURE] listening on {}", interface),

            Event::CaptureFailed { interface, error } =>
                format!("[CAPTURE] failed to start on {}: {}", interface, error),

            Event::AlertFired { name, severity, description } =>
                format!("[ALERT] [{}] {}: {}", severity, name, description),

            Event::CallbackFailed { rule, error } =>
                format!("[ALERT] callback failed for '{}': {}", rule, error),

            Event::StoreFailed { kind, error } =>
                format!("[STORE] {} write failed: {}", kind, error),

            Event::SessionSummary {
                duration_secs, packets_captured, packets_dropped, flows_tracked, alerts_emitted,
            } => format!(
                "[SUMMARY] duration={}s packets={} dropped={} flows={} alerts={}",
                duration_secs, packets_captured, packets_dropped, flows_tracked, alerts_emitted
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_falls_back_to_info() {
        assert_eq!(LogLevel::from_config("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from_config("warning"), LogLevel::Warning);
        assert_eq!(LogLevel::from_config("nonsense"), LogLevel::Info);
    }

    #[test]
    fn levels_order_by_severity() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
    }
}
