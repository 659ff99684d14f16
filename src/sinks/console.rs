//! Console sink implementation

use crate::core::{LogLevel, PersistedRecord, Result, Sink, TimestampFormat};
use colored::Colorize;
use std::io::Write;

/// Best-effort synchronous writer to stderr for interactive visibility
pub struct ConsoleSink {
    min_level: LogLevel,
    use_colors: bool,
    timestamp_format: TimestampFormat,
    /// Overrides stderr, mainly for tests
    target: Option<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
            use_colors: true,
            timestamp_format: TimestampFormat::default(),
            target: None,
        }
    }

    #[must_use]
    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// # Examples
    ///
    /// ```
    /// use tiered_log_pipeline::sinks::ConsoleSink;
    /// use tiered_log_pipeline::{LogLevel, TimestampFormat};
    ///
    /// let sink = ConsoleSink::new(LogLevel::Info)
    ///     .with_timestamp_format(TimestampFormat::TimeOnly);
    /// ```
    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Write somewhere other than stderr
    #[must_use]
    pub fn with_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.target = Some(writer);
        self
    }

    fn format_text(&self, record: &PersistedRecord) -> String {
        let level_str = if self.use_colors {
            format!("{:8}", record.level.to_str())
                .color(record.level.color_code())
                .to_string()
        } else {
            format!("{:8}", record.level.to_str())
        };

        let mut output = format!(
            "[{}] {} [{}] {} - {}",
            self.timestamp_format.format(&record.timestamp),
            level_str,
            record.logger,
            record.task_name.as_ref().unwrap_or(&record.thread_name),
            record.message
        );

        if !record.extra.is_empty() {
            let fields = record
                .extra
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(" ");
            output.push(' ');
            output.push_str(&fields);
        }

        if let Some(ref trace) = record.exc_info {
            output.push('\n');
            output.push_str(trace);
        }

        output
    }
}

impl Sink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn min_level(&self) -> LogLevel {
        self.min_level
    }

    fn write(&mut self, record: &PersistedRecord) -> Result<()> {
        let output = self.format_text(record);
        match self.target.as_mut() {
            Some(writer) => writeln!(writer, "{}", output)?,
            None => writeln!(std::io::stderr().lock(), "{}", output)?,
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        match self.target.as_mut() {
            Some(writer) => writer.flush()?,
            None => std::io::stderr().flush()?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogEvent, RecordFormatter};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Shared in-memory writer
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_plain_output() {
        let capture = Capture::default();
        let mut sink = ConsoleSink::new(LogLevel::Info)
            .with_colors(false)
            .with_writer(Box::new(capture.clone()));

        let event = LogEvent::new(LogLevel::Warning, "app.ws", "client lagging")
            .with_field("player_id", 7);
        let record = RecordFormatter::new().format(&event);
        sink.write(&record).unwrap();
        sink.flush().unwrap();

        let text = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert!(text.contains("WARNING"));
        assert!(text.contains("[app.ws]"));
        assert!(text.contains("client lagging"));
        assert!(text.contains("player_id=7"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_threshold() {
        let sink = ConsoleSink::new(LogLevel::Warning);
        assert!(!sink.accepts(LogLevel::Info));
        assert!(sink.accepts(LogLevel::Warning));
        assert!(sink.accepts(LogLevel::Critical));
    }
}
