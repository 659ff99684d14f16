//! Producer-side log event

use super::log_context::{current_task_name, FieldValue, LogContext};
use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use std::cell::RefCell;
use std::time::Instant;

// Thread-local cache for the thread label to avoid repeated allocations
thread_local! {
    static THREAD_NAME_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Thread name, or its id when the thread is unnamed, computed once per thread
fn get_thread_name() -> String {
    THREAD_NAME_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| {
                let current = std::thread::current();
                current
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("{:?}", current.id()))
            })
            .clone()
    })
}

/// Where an event was emitted from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSite {
    pub module: String,
    pub function: String,
    pub line: u32,
}

impl CallSite {
    pub fn new(module: &str, function: &str, line: u32) -> Self {
        Self {
            module: module.to_string(),
            function: function.to_string(),
            line,
        }
    }

    /// Source location of the caller
    ///
    /// Call chains marked `#[track_caller]` report their outermost caller.
    /// Only the file and line are known here, so `module` holds the source
    /// path and `function` stays empty.
    #[track_caller]
    pub fn caller() -> Self {
        let location = std::panic::Location::caller();
        Self {
            module: location.file().to_string(),
            function: String::new(),
            line: location.line(),
        }
    }

    /// No origin was recorded
    pub fn is_unknown(&self) -> bool {
        self.line == 0 && self.module.is_empty() && self.function.is_empty()
    }
}

/// An immutable event handed from an emitter to the dispatch queue
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub level: LogLevel,
    /// Dotted hierarchical logger name, e.g. `app.matchmaking`
    pub logger: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Monotonic emission instant, used for queue latency only
    pub emitted_at: Instant,
    pub origin: CallSite,
    pub thread_name: String,
    pub task_name: Option<String>,
    pub exc_info: Option<String>,
    pub stack_info: Option<String>,
    pub context: LogContext,
}

impl LogEvent {
    /// Stamp a new event with the current time and the calling thread's identity
    pub fn new(level: LogLevel, logger: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            logger: logger.into(),
            message: message.into(),
            timestamp: Utc::now(),
            emitted_at: Instant::now(),
            origin: CallSite::default(),
            thread_name: get_thread_name(),
            task_name: current_task_name(),
            exc_info: None,
            stack_info: None,
            context: LogContext::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, origin: CallSite) -> Self {
        self.origin = origin;
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: LogContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.context.add_field(key, value);
        self
    }

    /// Attach a formatted exception trace
    #[must_use]
    pub fn with_exception(mut self, trace: impl Into<String>) -> Self {
        self.exc_info = Some(trace.into());
        self
    }

    /// Attach an error and its `source()` chain as the exception trace
    #[must_use]
    pub fn with_error(self, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut trace = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push_str("\nCaused by: ");
            trace.push_str(&cause.to_string());
            source = cause.source();
        }
        self.with_exception(trace)
    }

    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack_info = Some(stack.into());
        self
    }
}
