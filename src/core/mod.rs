//! Core pipeline types and traits

pub mod config;
pub mod dispatcher;
pub mod emitter;
pub mod error;
pub mod fallback;
pub mod log_context;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod overflow_policy;
pub mod record;
pub mod sink;
pub mod timestamp;

pub use config::{LogTarget, PipelineConfig, QueueConfig, SinkConfig};
pub use dispatcher::{Dispatcher, DispatcherBuilder, DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT};
pub use emitter::LogEmitter;
pub use error::{LoggerError, Result};
pub use log_context::{current_task_name, FieldValue, LogContext, TaskScope};
pub use log_event::{CallSite, LogEvent};
pub use log_level::LogLevel;
pub use metrics::LoggerMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy, DEFAULT_BLOCK_TIMEOUT};
pub use record::{PersistedRecord, RecordFormatter, RESERVED_FIELDS};
pub use sink::Sink;
pub use timestamp::{parse_record_timestamp, TimestampFormat};
