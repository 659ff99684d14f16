//! Pipeline metrics for observability
//!
//! Counters for monitoring pipeline health: emitted and delivered events,
//! drops on overflow, and per-sink failures.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between emitters and the dispatch worker
///
/// # Example
///
/// ```
/// use tiered_log_pipeline::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_emitted();
/// metrics.record_dropped();
///
/// assert_eq!(metrics.total_emitted(), 1);
/// assert_eq!(metrics.dropped_count(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Events accepted by an emitter (queued, or dropped later)
    total_emitted: AtomicU64,

    /// Events the worker presented to every accepting sink
    total_delivered: AtomicU64,

    /// Events dropped on overflow or after shutdown
    dropped_count: AtomicU64,

    /// Number of times the queue was found full
    queue_full_events: AtomicU64,

    /// Number of times a producer waited for queue space
    block_events: AtomicU64,

    /// Failed or panicked sink writes
    sink_failures: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            total_emitted: AtomicU64::new(0),
            total_delivered: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            queue_full_events: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_emitted(&self) -> u64 {
        self.total_emitted.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn total_delivered(&self) -> u64 {
        self.total_delivered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_events(&self) -> u64 {
        self.queue_full_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    /// Record methods return the previous value
    #[inline]
    pub fn record_emitted(&self) -> u64 {
        self.total_emitted.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_delivered(&self) -> u64 {
        self.total_delivered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_full(&self) -> u64 {
        self.queue_full_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    /// Dropped events as a percentage of emitted events (0.0 - 100.0)
    pub fn drop_rate(&self) -> f64 {
        let emitted = self.total_emitted() as f64;
        if emitted == 0.0 {
            0.0
        } else {
            (self.dropped_count() as f64 / emitted * 100.0).min(100.0)
        }
    }

    pub fn reset(&self) {
        self.total_emitted.store(0, Ordering::Relaxed);
        self.total_delivered.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
        self.queue_full_events.store(0, Ordering::Relaxed);
        self.block_events.store(0, Ordering::Relaxed);
        self.sink_failures.store(0, Ordering::Relaxed);
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total_emitted: AtomicU64::new(self.total_emitted()),
            total_delivered: AtomicU64::new(self.total_delivered()),
            dropped_count: AtomicU64::new(self.dropped_count()),
            queue_full_events: AtomicU64::new(self.queue_full_events()),
            block_events: AtomicU64::new(self.block_events()),
            sink_failures: AtomicU64::new(self.sink_failures()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.total_emitted(), 0);
        assert_eq!(metrics.total_delivered(), 0);
        assert_eq!(metrics.dropped_count(), 0);
        assert_eq!(metrics.sink_failures(), 0);
    }

    #[test]
    fn test_record_returns_previous() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.record_dropped(), 0);
        assert_eq!(metrics.record_dropped(), 1);
        assert_eq!(metrics.dropped_count(), 2);
    }

    #[test]
    fn test_drop_rate() {
        let metrics = LoggerMetrics::new();
        assert_eq!(metrics.drop_rate(), 0.0);

        for _ in 0..100 {
            metrics.record_emitted();
        }
        for _ in 0..10 {
            metrics.record_dropped();
        }
        let rate = metrics.drop_rate();
        assert!((9.9..=10.1).contains(&rate), "Drop rate was {}", rate);
    }

    #[test]
    fn test_clone_is_snapshot() {
        let metrics = LoggerMetrics::new();
        metrics.record_sink_failure();

        let snapshot = metrics.clone();
        metrics.record_sink_failure();

        assert_eq!(snapshot.sink_failures(), 1);
        assert_eq!(metrics.sink_failures(), 2);
    }

    #[test]
    fn test_reset() {
        let metrics = LoggerMetrics::new();
        metrics.record_emitted();
        metrics.record_queue_full();
        metrics.reset();
        assert_eq!(metrics.total_emitted(), 0);
        assert_eq!(metrics.queue_full_events(), 0);
    }
}
