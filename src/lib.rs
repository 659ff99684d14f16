//! # Tiered Log Pipeline
//!
//! Structured logging with tiered persistence and a query engine for the
//! files it writes.
//!
//! ## Write side
//!
//! - **Non-blocking emission**: producers hand events to a bounded queue;
//!   a single worker performs all sink I/O
//! - **Tiered sinks**: console, one size-rotated JSON-lines file per
//!   severity tier, and an SQLite alert table for ERROR and above
//! - **Failure isolation**: a failing or panicking sink is reported on
//!   stderr and never reaches application code
//!
//! ## Read side
//!
//! - **Queries**: filter by logger, keyword, game id and player id; group by
//!   day or game; page through groups newest first
//! - **Live tail**: re-run a query on an interval until the session expires
//!
//! ## Example
//!
//! ```no_run
//! use tiered_log_pipeline::{info, PipelineConfig, DEFAULT_SHUTDOWN_TIMEOUT};
//!
//! tiered_log_pipeline::init(PipelineConfig::standard("logs")).unwrap();
//! info!("app.main", "server listening on port {}", 8080);
//! tiered_log_pipeline::shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
//! ```

pub mod core;
pub mod macros;
pub mod query;
pub mod sinks;

pub mod prelude {
    pub use crate::core::{
        CallSite, Dispatcher, DispatcherBuilder, FieldValue, LogContext, LogEmitter, LogEvent,
        LogLevel, LoggerError, LoggerMetrics, OverflowCallback, OverflowPolicy, PersistedRecord,
        PipelineConfig, RecordFormatter, Result, Sink, SinkConfig, TaskScope, TimestampFormat,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::query::{FilterSpec, GroupBy, LogQueryEngine, Page, QueryRequest, QueryService};
    pub use crate::sinks::{ConsoleSink, RotatingFileSink, RotationPolicy};
}

pub use crate::core::emitter::{emit, emit_event, emitter, init, is_initialized, shutdown};
pub use crate::core::{
    CallSite, Dispatcher, DispatcherBuilder, FieldValue, LogContext, LogEmitter, LogEvent,
    LogLevel, LoggerError, LoggerMetrics, OverflowCallback, OverflowPolicy, PersistedRecord,
    PipelineConfig, QueueConfig, RecordFormatter, Result, Sink, SinkConfig, TaskScope,
    TimestampFormat, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::sinks::{ConsoleSink, RotatingFileSink, RotationPolicy};
