//! Bounded dispatch queue with a single consumer
//!
//! Any number of producers enqueue `LogEvent`s; one worker thread drains
//! them in FIFO order, formats each event once, and presents the record to
//! every sink whose threshold accepts it. Because only the worker touches
//! the sinks, file sinks have a single writer and need no extra locking.

use super::{
    error::{LoggerError, Result},
    fallback,
    log_event::LogEvent,
    metrics::LoggerMetrics,
    overflow_policy::{OverflowCallback, OverflowPolicy},
    record::RecordFormatter,
    sink::Sink,
};
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout for draining the queue (5 seconds)
///
/// Used when the dispatcher is dropped without explicit shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Events drained per sink-lock acquisition
const BATCH_SIZE: usize = 50;

/// How many times a producer evicts under `DropOldest` before giving up
const EVICTION_ATTEMPTS: usize = 3;

type SinkList = Arc<Mutex<Vec<Box<dyn Sink>>>>;

pub struct Dispatcher {
    sinks: SinkList,
    sender: RwLock<Option<Sender<LogEvent>>>,
    /// Producer-side handle used only to evict under `DropOldest`
    evictor: Receiver<LogEvent>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    metrics: Arc<LoggerMetrics>,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
    capacity: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    fn start(
        sinks: Vec<Box<dyn Sink>>,
        capacity: usize,
        overflow_policy: OverflowPolicy,
        on_overflow: Option<OverflowCallback>,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(LoggerError::config("Dispatcher", "queue capacity must be positive"));
        }

        let (sender, receiver) = bounded(capacity);
        let sinks: SinkList = Arc::new(Mutex::new(sinks));
        let metrics = Arc::new(LoggerMetrics::new());
        let evictor = receiver.clone();

        let worker_sinks = Arc::clone(&sinks);
        let worker_metrics = Arc::clone(&metrics);
        let handle = thread::Builder::new()
            .name("log-dispatch".to_string())
            .spawn(move || Self::run_worker(receiver, worker_sinks, worker_metrics))
            .map_err(|e| LoggerError::io_operation("starting dispatch worker", "spawn failed", e))?;

        Ok(Self {
            sinks,
            sender: RwLock::new(Some(sender)),
            evictor,
            worker: Mutex::new(Some(handle)),
            metrics,
            overflow_policy,
            on_overflow,
            capacity,
        })
    }

    fn run_worker(receiver: Receiver<LogEvent>, sinks: SinkList, metrics: Arc<LoggerMetrics>) {
        let formatter = RecordFormatter::new();
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        // recv() fails only once every sender is gone and the queue is empty
        while let Ok(event) = receiver.recv() {
            batch.push(event);
            while batch.len() < BATCH_SIZE {
                match receiver.try_recv() {
                    Ok(event) => batch.push(event),
                    Err(_) => break,
                }
            }

            Self::process_batch(&sinks, &formatter, &batch, &metrics);
            batch.clear();
        }

        let mut sinks = sinks.lock();
        Self::flush_all(&mut sinks);
    }

    /// Deliver a batch in order, isolating each sink's failures and panics
    fn process_batch(
        sinks: &SinkList,
        formatter: &RecordFormatter,
        batch: &[LogEvent],
        metrics: &LoggerMetrics,
    ) {
        let mut sinks = sinks.lock();

        for event in batch {
            let record = formatter.format(event);

            for sink in sinks.iter_mut() {
                if !sink.accepts(record.level) {
                    continue;
                }

                let result =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.write(&record)));
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        metrics.record_sink_failure();
                        fallback::report(
                            "ERROR",
                            format_args!(
                                "Sink '{}' failed: {}. Original event: [{}] {}: {}",
                                sink.name(),
                                e,
                                record.level,
                                record.logger,
                                record.message
                            ),
                        );
                    }
                    Err(panic_info) => {
                        metrics.record_sink_failure();
                        fallback::report(
                            "CRITICAL",
                            format_args!(
                                "Sink '{}' panicked: {}. Other sinks continue to function.",
                                sink.name(),
                                fallback::panic_message(panic_info.as_ref())
                            ),
                        );
                    }
                }
            }

            metrics.record_delivered();
        }

        Self::flush_all(&mut sinks);
    }

    fn flush_all(sinks: &mut [Box<dyn Sink>]) {
        for sink in sinks.iter_mut() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| sink.flush()));
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    fallback::report("ERROR", format_args!("Sink '{}' flush failed: {}", sink.name(), e));
                }
                Err(panic_info) => {
                    fallback::report(
                        "CRITICAL",
                        format_args!(
                            "Sink '{}' panicked during flush: {}",
                            sink.name(),
                            fallback::panic_message(panic_info.as_ref())
                        ),
                    );
                }
            }
        }
    }

    /// Hand an event to the worker without blocking past the overflow policy
    pub fn dispatch(&self, event: LogEvent) {
        self.metrics.record_emitted();

        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            // Shut down: events are discarded silently
            self.metrics.record_dropped();
            return;
        };

        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => self.handle_overflow(sender, event),
            Err(TrySendError::Disconnected(_)) => {
                self.metrics.record_dropped();
            }
        }
    }

    fn handle_overflow(&self, sender: &Sender<LogEvent>, event: LogEvent) {
        self.metrics.record_queue_full();

        match &self.overflow_policy {
            OverflowPolicy::DropNewest => {
                self.metrics.record_dropped();
            }

            OverflowPolicy::DropOldest => self.evict_and_send(sender, event),

            OverflowPolicy::BlockWithTimeout(timeout) => {
                self.metrics.record_block();
                match sender.send_timeout(event, *timeout) {
                    Ok(()) => {}
                    Err(SendTimeoutError::Timeout(_)) => self.alert_and_drop(),
                    Err(SendTimeoutError::Disconnected(_)) => {
                        self.metrics.record_dropped();
                    }
                }
            }

            OverflowPolicy::AlertAndDrop => self.alert_and_drop(),
        }
    }

    /// Evict the oldest queued event, then retry the new one
    fn evict_and_send(&self, sender: &Sender<LogEvent>, event: LogEvent) {
        let mut pending = event;
        for _ in 0..EVICTION_ATTEMPTS {
            if self.evictor.try_recv().is_ok() {
                self.alert_and_drop();
            }
            match sender.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => pending = back,
                Err(TrySendError::Disconnected(_)) => {
                    self.metrics.record_dropped();
                    return;
                }
            }
        }
        // Other producers keep refilling the queue; give up on this one
        self.alert_and_drop();
    }

    /// Count a drop and alert on the first one and every 1000th after
    fn alert_and_drop(&self) {
        let dropped_count = self.metrics.record_dropped();
        let should_alert = dropped_count == 0 || (dropped_count + 1) % 1000 == 0;

        if should_alert {
            fallback::report(
                "WARNING",
                format_args!(
                    "Queue full ({} slots, policy {}), {} events dropped. \
                     Consider increasing capacity or checking slow sinks.",
                    self.capacity,
                    self.overflow_policy,
                    dropped_count + 1
                ),
            );

            if let Some(ref callback) = self.on_overflow {
                callback(dropped_count + 1);
            }
        }
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Events currently waiting in the queue
    pub fn queue_len(&self) -> usize {
        self.evictor.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn overflow_policy(&self) -> &OverflowPolicy {
        &self.overflow_policy
    }

    pub fn sink_names(&self) -> Vec<String> {
        self.sinks.lock().iter().map(|s| s.name().to_string()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    /// Flush every sink now
    ///
    /// Waits for the worker to finish its current batch. Fails with
    /// `LoggerStopped` once the dispatcher has been shut down.
    pub fn flush(&self) -> Result<()> {
        if !self.is_running() {
            return Err(LoggerError::LoggerStopped);
        }
        let mut sinks = self.sinks.lock();
        for sink in sinks.iter_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Stop accepting events, drain the queue, and close every sink
    ///
    /// Returns `true` when everything was delivered and closed within
    /// `timeout`. Calling it again is a no-op returning `true`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        // Close the channel so the worker exits after draining
        drop(self.sender.write().take());

        let Some(handle) = self.worker.lock().take() else {
            return true;
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    fallback::report(
                        "ERROR",
                        format_args!("Dispatch worker panicked during shutdown: {:?}", e),
                    );
                    return false;
                }
                break;
            }

            if start.elapsed() >= timeout {
                fallback::report(
                    "WARNING",
                    format_args!(
                        "Dispatch worker did not finish within {:?}. {} events may be lost.",
                        timeout,
                        self.evictor.len()
                    ),
                );
                return false;
            }

            thread::sleep(Duration::from_millis(5));
        }

        // Dropping the sinks closes their files and connections
        let mut sinks = self.sinks.lock();
        Self::flush_all(&mut sinks);
        sinks.clear();

        let dropped = self.metrics.dropped_count();
        if dropped > 0 {
            fallback::report(
                "WARNING",
                format_args!(
                    "Pipeline shut down with {} dropped events (drop rate: {:.2}%)",
                    dropped,
                    self.metrics.drop_rate()
                ),
            );
        }

        true
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.worker.lock().is_some() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

/// Builder for a running `Dispatcher`
///
/// # Example
/// ```
/// use tiered_log_pipeline::prelude::*;
///
/// let dispatcher = Dispatcher::builder()
///     .sink(ConsoleSink::new(LogLevel::Warning))
///     .capacity(1000)
///     .overflow_policy(OverflowPolicy::DropOldest)
///     .build()
///     .unwrap();
/// assert!(dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT));
/// ```
pub struct DispatcherBuilder {
    sinks: Vec<Box<dyn Sink>>,
    capacity: usize,
    overflow_policy: OverflowPolicy,
    on_overflow: Option<OverflowCallback>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            capacity: DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            on_overflow: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn boxed_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Called with the running drop total when events are dropped
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Spawn the worker thread and return the running dispatcher
    pub fn build(self) -> Result<Dispatcher> {
        Dispatcher::start(self.sinks, self.capacity, self.overflow_policy, self.on_overflow)
    }
}

impl Default for DispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}
