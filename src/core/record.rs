//! On-disk record format
//!
//! Every persisted record is a single JSON object on its own line. The fixed
//! fields are `timestamp`, `level`, `logger`, `message`, `module`,
//! `function`, `line`, `thread_name`, plus optional `task_name`, `exc_info`
//! and `stack_info`. Extra structured fields sit next to them at the top
//! level. Absent optional fields are omitted, never written as `null`.

use super::error::Result;
use super::log_event::LogEvent;
use super::log_level::LogLevel;
use super::timestamp::record_timestamp;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field names owned by the record schema; extra fields may not reuse them
pub const RESERVED_FIELDS: [&str; 11] = [
    "timestamp",
    "level",
    "logger",
    "message",
    "module",
    "function",
    "line",
    "thread_name",
    "task_name",
    "exc_info",
    "stack_info",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    #[serde(with = "record_timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    pub level: LogLevel,
    pub logger: String,
    pub message: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub thread_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exc_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_info: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl PersistedRecord {
    /// Parse one line of a log file
    ///
    /// Returns `None` for blank, truncated, or otherwise malformed lines so
    /// that a scan can skip them and continue.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Serialize as a single JSON line, without the trailing newline
    pub fn to_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Read an extra field as text; numbers and booleans are stringified
    pub fn extra_text(&self, key: &str) -> Option<String> {
        match self.extra.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// Canonical mapping from a `LogEvent` to a `PersistedRecord`
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFormatter;

impl RecordFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic and lossless for every populated event field
    pub fn format(&self, event: &LogEvent) -> PersistedRecord {
        let extra = event
            .context
            .fields()
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .filter_map(|(key, value)| Some((key.clone(), value.to_json_value()?)))
            .collect();

        PersistedRecord {
            timestamp: event.timestamp.fixed_offset(),
            level: event.level,
            logger: event.logger.clone(),
            message: event.message.clone(),
            module: event.origin.module.clone(),
            function: event.origin.function.clone(),
            line: event.origin.line,
            thread_name: event.thread_name.clone(),
            task_name: event.task_name.clone(),
            exc_info: event.exc_info.clone(),
            stack_info: event.stack_info.clone(),
            extra,
        }
    }

    /// Format straight to a JSON line
    pub fn format_line(&self, event: &LogEvent) -> Result<String> {
        self.format(event).to_line()
    }
}
