//! Process-wide logging facade
//!
//! A `LogEmitter` owns one `Dispatcher`. Applications normally install a
//! single emitter with [`init`] at startup and tear it down with
//! [`shutdown`]; the logging macros talk to that global instance.

use super::config::PipelineConfig;
use super::dispatcher::{Dispatcher, DEFAULT_SHUTDOWN_TIMEOUT};
use super::error::{LoggerError, Result};
use super::log_context::LogContext;
use super::log_event::{CallSite, LogEvent};
use super::log_level::LogLevel;
use super::metrics::LoggerMetrics;
use super::overflow_policy::OverflowCallback;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

static GLOBAL: RwLock<Option<Arc<LogEmitter>>> = parking_lot::const_rwlock(None);

/// Producer-side entry point
///
/// `emit` never returns an error and never waits longer than the queue's
/// overflow policy allows, whatever state the sinks are in.
pub struct LogEmitter {
    dispatcher: Dispatcher,
    /// Lowest threshold of any sink; quieter events are not queued
    min_level: LogLevel,
}

impl LogEmitter {
    pub fn new(dispatcher: Dispatcher, min_level: LogLevel) -> Self {
        Self {
            dispatcher,
            min_level,
        }
    }

    /// Validate the configuration, open every sink and start the worker
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        Self::from_config_with_callback(config, None)
    }

    pub fn from_config_with_callback(
        mut config: PipelineConfig,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        config.validate()?;

        let min_level = config
            .sinks
            .iter()
            .map(|s| s.min_level())
            .min()
            .unwrap_or(LogLevel::Critical);

        let mut builder = Dispatcher::builder()
            .capacity(config.queue.capacity)
            .overflow_policy(config.queue.overflow_policy.clone());
        if let Some(callback) = on_overflow {
            builder = builder.on_overflow(callback);
        }
        for sink in config.build_sinks()? {
            builder = builder.boxed_sink(sink);
        }

        Ok(Self::new(builder.build()?, min_level))
    }

    #[inline]
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level && self.dispatcher.is_running()
    }

    /// Queue an event stamped with the caller's source location
    #[track_caller]
    pub fn emit(&self, level: LogLevel, logger: &str, message: impl Into<String>, fields: LogContext) {
        if !self.is_enabled(level) {
            return;
        }
        self.emit_event(LogEvent::new(level, logger, message).with_context(fields));
    }

    /// Queue a fully built event
    ///
    /// An event without an origin gets the caller's location.
    #[track_caller]
    pub fn emit_event(&self, mut event: LogEvent) {
        if event.level < self.min_level {
            return;
        }
        if event.origin.is_unknown() {
            event.origin = CallSite::caller();
        }
        self.dispatcher.dispatch(event);
    }

    #[track_caller]
    pub fn debug(&self, logger: &str, message: impl Into<String>) {
        self.emit(LogLevel::Debug, logger, message, LogContext::new());
    }

    #[track_caller]
    pub fn info(&self, logger: &str, message: impl Into<String>) {
        self.emit(LogLevel::Info, logger, message, LogContext::new());
    }

    #[track_caller]
    pub fn warning(&self, logger: &str, message: impl Into<String>) {
        self.emit(LogLevel::Warning, logger, message, LogContext::new());
    }

    #[track_caller]
    pub fn error(&self, logger: &str, message: impl Into<String>) {
        self.emit(LogLevel::Error, logger, message, LogContext::new());
    }

    #[track_caller]
    pub fn critical(&self, logger: &str, message: impl Into<String>) {
        self.emit(LogLevel::Critical, logger, message, LogContext::new());
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        self.dispatcher.metrics()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Drain the queue, then flush and close every sink
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.dispatcher.shutdown(timeout)
    }
}

/// Install the process-wide emitter
///
/// # Errors
///
/// Fails if an emitter is already installed or the configuration is invalid.
pub fn init(config: PipelineConfig) -> Result<()> {
    if is_initialized() {
        return Err(already_initialized());
    }

    // Only installation holds the lock
    let emitter = LogEmitter::from_config(config)?;

    let mut global = GLOBAL.write();
    if global.is_some() {
        drop(global);
        emitter.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        return Err(already_initialized());
    }
    *global = Some(Arc::new(emitter));
    Ok(())
}

fn already_initialized() -> LoggerError {
    LoggerError::config("LogEmitter", "already initialized")
}

/// Uninstall the global emitter and drain it
///
/// Returns `false` if the queue could not be drained within `timeout`.
/// Calling it without an installed emitter is a no-op returning `true`.
pub fn shutdown(timeout: Duration) -> bool {
    let emitter = GLOBAL.write().take();
    match emitter {
        Some(emitter) => emitter.shutdown(timeout),
        None => true,
    }
}

pub fn emitter() -> Option<Arc<LogEmitter>> {
    GLOBAL.read().clone()
}

pub fn is_initialized() -> bool {
    GLOBAL.read().is_some()
}

/// Whether the global emitter would queue an event at `level`
#[inline]
pub fn enabled(level: LogLevel) -> bool {
    GLOBAL
        .read()
        .as_ref()
        .is_some_and(|emitter| emitter.is_enabled(level))
}

/// Emit through the global emitter; silently ignored before `init`
#[track_caller]
pub fn emit(level: LogLevel, logger: &str, message: impl Into<String>, fields: LogContext) {
    if let Some(emitter) = emitter() {
        emitter.emit(level, logger, message, fields);
    }
}

#[track_caller]
pub fn emit_event(event: LogEvent) {
    if let Some(emitter) = emitter() {
        emitter.emit_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SinkConfig;
    use crate::core::record::PersistedRecord;
    use std::fs;

    fn file_config(dir: &std::path::Path, min_level: LogLevel) -> PipelineConfig {
        PipelineConfig {
            sinks: vec![SinkConfig::RotatingFile {
                min_level,
                path: dir.join("app.log"),
                max_bytes: 1024 * 1024,
                backup_count: 1,
            }],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_emit_then_shutdown_persists_everything() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = LogEmitter::from_config(file_config(dir.path(), LogLevel::Debug)).unwrap();

        for i in 0..100 {
            emitter.emit(
                LogLevel::Info,
                "app.game",
                format!("move {}", i),
                LogContext::new().with_field("game_id", 42),
            );
        }
        assert!(emitter.shutdown(Duration::from_secs(5)));

        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        let records: Vec<PersistedRecord> =
            content.lines().filter_map(PersistedRecord::parse_line).collect();
        assert_eq!(records.len(), 100);
        assert_eq!(records[0].message, "move 0");
        assert_eq!(records[99].message, "move 99");
        assert_eq!(records[0].extra_text("game_id").as_deref(), Some("42"));
    }

    #[test]
    fn test_events_below_every_threshold_are_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = LogEmitter::from_config(file_config(dir.path(), LogLevel::Warning)).unwrap();

        emitter.debug("app", "quiet");
        emitter.info("app", "quiet");
        emitter.error("app", "loud");
        assert!(emitter.shutdown(Duration::from_secs(5)));

        assert_eq!(emitter.metrics().total_emitted(), 1);
        assert!(!emitter.is_enabled(LogLevel::Critical));
    }

    #[test]
    fn test_emit_after_shutdown_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = LogEmitter::from_config(file_config(dir.path(), LogLevel::Debug)).unwrap();
        assert!(emitter.shutdown(Duration::from_secs(5)));

        emitter.critical("app", "too late");
        emitter.emit_event(LogEvent::new(LogLevel::Critical, "app", "also too late"));
        assert_eq!(emitter.metrics().total_delivered(), 0);
    }

    #[test]
    fn test_api_emits_record_caller_location() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = LogEmitter::from_config(file_config(dir.path(), LogLevel::Debug)).unwrap();

        emitter.emit(LogLevel::Info, "app.x", "hello", LogContext::new());
        let helper_line = line!() + 1;
        emitter.warning("app.x", "via helper");
        emitter.emit_event(LogEvent::new(LogLevel::Error, "app.x", "bare event"));
        emitter.emit_event(
            LogEvent::new(LogLevel::Error, "app.x", "explicit")
                .at(CallSite::new("app::x", "handler", 7)),
        );
        assert!(emitter.shutdown(Duration::from_secs(5)));

        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        let records: Vec<PersistedRecord> =
            content.lines().filter_map(PersistedRecord::parse_line).collect();
        assert_eq!(records.len(), 4);

        for record in &records[..3] {
            assert_ne!(record.line, 0, "{}", record.message);
            assert!(record.module.ends_with("emitter.rs"), "{}", record.module);
        }
        assert_eq!(records[1].line, helper_line);

        assert_eq!(records[3].module, "app::x");
        assert_eq!(records[3].function, "handler");
        assert_eq!(records[3].line, 7);
    }

    /// The only unit test that touches the global emitter
    #[test]
    fn test_concurrent_init_installs_exactly_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || init(file_config(&path, LogLevel::Debug)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, LoggerError::InvalidConfiguration { .. })));
        assert!(is_initialized());

        emit(LogLevel::Info, "app.global", "installed", LogContext::new());
        assert!(shutdown(Duration::from_secs(5)));
        assert!(!is_initialized());

        let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
        let installed = content
            .lines()
            .filter_map(PersistedRecord::parse_line)
            .filter(|r| r.logger == "app.global")
            .count();
        assert_eq!(installed, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.queue.capacity = 0;
        assert!(LogEmitter::from_config(config).is_err());
    }
}
