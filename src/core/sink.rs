//! Sink trait for log record destinations

use super::{error::Result, log_level::LogLevel, record::PersistedRecord};

/// A destination for persisted records with its own severity threshold
///
/// Sinks are driven by the single dispatch worker, so `write` is never
/// called concurrently for one sink. A failing `write` is reported and
/// isolated by the worker; it never reaches the emitting code.
pub trait Sink: Send {
    fn name(&self) -> &str;

    fn min_level(&self) -> LogLevel;

    /// Whether this sink wants events at `level`
    fn accepts(&self, level: LogLevel) -> bool {
        level >= self.min_level()
    }

    fn write(&mut self, record: &PersistedRecord) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
