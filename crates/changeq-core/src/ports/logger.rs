//! QueueLogger port - structured event sink.
//!
//! Every entry is `(payload, message)`. The payload is a JSON object whose
//! `event` field carries the event name (see [`crate::observability::events`]).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Injectable log sink. Swappable at runtime via `ChangeQueue::set_logger`.
pub trait QueueLogger: Send + Sync {
    fn info(&self, payload: Value, message: &str);
    fn warn(&self, payload: Value, message: &str);
    fn error(&self, payload: Value, message: &str);
}

fn event_name(payload: &Value) -> &str {
    payload
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

/// Default sink: forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl QueueLogger for TracingLogger {
    fn info(&self, payload: Value, message: &str) {
        let event = event_name(&payload);
        tracing::info!(target: "changeq", event, payload = %payload, "{message}");
    }

    fn warn(&self, payload: Value, message: &str) {
        let event = event_name(&payload);
        tracing::warn!(target: "changeq", event, payload = %payload, "{message}");
    }

    fn error(&self, payload: Value, message: &str) {
        let event = event_name(&payload);
        tracing::error!(target: "changeq", event, payload = %payload, "{message}");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl QueueLogger for NoopLogger {
    fn info(&self, _payload: Value, _message: &str) {}
    fn warn(&self, _payload: Value, _message: &str) {}
    fn error(&self, _payload: Value, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub payload: Value,
    pub message: String,
}

impl LogRecord {
    pub fn event(&self) -> &str {
        event_name(&self.payload)
    }
}

/// Keeps every entry in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Entries for `event`, in emission order.
    pub fn events(&self, event: &str) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.event() == event)
            .cloned()
            .collect()
    }

    pub fn count(&self, level: LogLevel, event: &str) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level && r.event() == event)
            .count()
    }

    pub fn count_level(&self, level: LogLevel) -> usize {
        self.records.lock().iter().filter(|r| r.level == level).count()
    }

    pub fn clear(&self) {
        self.records.lock().clear();
    }

    fn push(&self, level: LogLevel, payload: Value, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            payload,
            message: message.to_string(),
        });
    }
}

impl QueueLogger for MemoryLogger {
    fn info(&self, payload: Value, message: &str) {
        self.push(LogLevel::Info, payload, message);
    }

    fn warn(&self, payload: Value, message: &str) {
        self.push(LogLevel::Warn, payload, message);
    }

    fn error(&self, payload: Value, message: &str) {
        self.push(LogLevel::Error, payload, message);
    }
}
