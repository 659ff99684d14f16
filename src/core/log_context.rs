//! Structured fields and task identity for log events
//!
//! This module provides:
//! - `FieldValue` / `LogContext`: extra key-value fields carried by an event
//! - `TaskScope`: RAII guard naming the task the current thread works for

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

/// Value type for structured logging fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Null => write!(f, "null"),
        }
    }
}

impl FieldValue {
    /// JSON form of the value; `None` for `Null` and for NaN or infinite
    /// floats, which have no JSON representation
    #[must_use]
    pub fn to_json_value(&self) -> Option<serde_json::Value> {
        match self {
            FieldValue::String(s) => Some(serde_json::Value::String(s.clone())),
            FieldValue::Int(i) => Some(serde_json::Value::Number((*i).into())),
            FieldValue::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number),
            FieldValue::Bool(b) => Some(serde_json::Value::Bool(*b)),
            FieldValue::Null => None,
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// Extra key-value fields attached to a single event
///
/// Keys are kept sorted so formatted records are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogContext {
    fields: BTreeMap<String, FieldValue>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn add_field<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.fields.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Format fields as key=value pairs
    pub fn format_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_fields())
    }
}

thread_local! {
    static TASK_NAME: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Name of the task the current thread is working for, if any
pub fn current_task_name() -> Option<String> {
    TASK_NAME.with(|name| name.borrow().clone())
}

/// RAII guard naming the task for events emitted on this thread
///
/// Scopes nest: dropping a guard restores the name that was active
/// when it was entered.
///
/// # Example
///
/// ```
/// use tiered_log_pipeline::core::log_context::{current_task_name, TaskScope};
///
/// {
///     let _scope = TaskScope::enter("matchmaking-sweep");
///     assert_eq!(current_task_name().as_deref(), Some("matchmaking-sweep"));
/// }
/// assert_eq!(current_task_name(), None);
/// ```
pub struct TaskScope {
    previous: Option<String>,
}

impl TaskScope {
    pub fn enter(name: impl Into<String>) -> Self {
        let previous = TASK_NAME.with(|slot| slot.borrow_mut().replace(name.into()));
        Self { previous }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        TASK_NAME.with(|slot| *slot.borrow_mut() = previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_with_fields() {
        let ctx = LogContext::new()
            .with_field("game_id", 42)
            .with_field("player", "ada")
            .with_field("ranked", true);

        assert_eq!(ctx.fields().len(), 3);
        assert_eq!(ctx.get("game_id"), Some(&FieldValue::Int(42)));
    }

    #[test]
    fn test_log_context_format_is_sorted() {
        let ctx = LogContext::new()
            .with_field("zeta", "z")
            .with_field("alpha", 1);

        assert_eq!(ctx.format_fields(), "alpha=1 zeta=z");
    }

    #[test]
    fn test_task_scope_nesting() {
        assert_eq!(current_task_name(), None);
        let outer = TaskScope::enter("outer");
        {
            let _inner = TaskScope::enter("inner");
            assert_eq!(current_task_name().as_deref(), Some("inner"));
        }
        assert_eq!(current_task_name().as_deref(), Some("outer"));
        drop(outer);
        assert_eq!(current_task_name(), None);
    }

    #[test]
    fn test_task_scope_is_per_thread() {
        let _scope = TaskScope::enter("main-task");
        let other = std::thread::spawn(current_task_name).join().unwrap();
        assert_eq!(other, None);
    }
}
