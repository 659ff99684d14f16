//! Stress tests for the dispatch queue
//!
//! These tests verify:
//! - Per-producer FIFO order survives many concurrent producers
//! - Overflow policies bound producer latency behind a stalled sink
//! - Every emitted event is either delivered or counted as dropped
//! - Shutdown drains the queue into the files

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tiered_log_pipeline::prelude::*;

/// Records every message it receives
struct CollectingSink(Arc<Mutex<Vec<String>>>);

impl Sink for CollectingSink {
    fn name(&self) -> &str {
        "collect"
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }

    fn write(&mut self, record: &PersistedRecord) -> Result<()> {
        self.0.lock().push(record.message.clone());
        Ok(())
    }
}

/// Sleeps on every write, standing in for a stalled database
struct SlowSink(Duration);

impl Sink for SlowSink {
    fn name(&self) -> &str {
        "slow"
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }

    fn write(&mut self, _record: &PersistedRecord) -> Result<()> {
        thread::sleep(self.0);
        Ok(())
    }
}

/// Test that each producer's events arrive in emission order
#[test]
fn test_concurrent_producers_keep_fifo() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .sink(CollectingSink(Arc::clone(&seen)))
            .capacity(100_000)
            .build()
            .expect("Failed to build dispatcher"),
    );

    let producers = 8;
    let per_producer = 2_000;
    let handles: Vec<_> = (0..producers)
        .map(|p| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..per_producer {
                    dispatcher.dispatch(LogEvent::new(LogLevel::Info, "stress", format!("{}:{}", p, i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(dispatcher.shutdown(Duration::from_secs(10)));

    let seen = seen.lock();
    assert_eq!(seen.len(), producers * per_producer);

    let mut last: HashMap<usize, usize> = HashMap::new();
    for message in seen.iter() {
        let (p, i) = message.split_once(':').unwrap();
        let (p, i): (usize, usize) = (p.parse().unwrap(), i.parse().unwrap());
        if let Some(prev) = last.insert(p, i) {
            assert!(i > prev, "producer {} delivered {} after {}", p, i, prev);
        }
    }
}

/// Test that a stalled sink cannot stall producers past the overflow timeout
#[test]
fn test_block_with_timeout_bounds_latency() {
    let dropped_alerts = Arc::new(AtomicU64::new(0));
    let alerts = Arc::clone(&dropped_alerts);
    let dispatcher = Dispatcher::builder()
        .sink(SlowSink(Duration::from_millis(20)))
        .capacity(4)
        .overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(10)))
        .on_overflow(Arc::new(move |_dropped: u64| {
            alerts.fetch_add(1, Ordering::Relaxed);
        }))
        .build()
        .expect("Failed to build dispatcher");

    let mut worst = Duration::ZERO;
    for i in 0..100 {
        let start = Instant::now();
        dispatcher.dispatch(LogEvent::new(LogLevel::Error, "stress", format!("event {}", i)));
        worst = worst.max(start.elapsed());
    }

    // generous bound: the timeout plus scheduling noise
    assert!(worst < Duration::from_millis(500), "producer waited {:?}", worst);

    let metrics = dispatcher.metrics().clone();
    assert!(metrics.dropped_count() > 0);
    assert!(metrics.block_events() > 0);
    assert!(dropped_alerts.load(Ordering::Relaxed) >= 1);

    assert!(dispatcher.shutdown(Duration::from_secs(10)));
    let metrics = dispatcher.metrics();
    assert_eq!(metrics.total_emitted(), 100);
    assert_eq!(metrics.total_delivered() + metrics.dropped_count(), 100);
}

/// Test that DropOldest keeps the newest events and accounts for every drop
#[test]
fn test_drop_oldest_accounting_under_burst() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::builder()
        .sink(CollectingSink(Arc::clone(&seen)))
        .sink(SlowSink(Duration::from_millis(1)))
        .capacity(16)
        .overflow_policy(OverflowPolicy::DropOldest)
        .build()
        .expect("Failed to build dispatcher");

    for i in 0..1_000 {
        dispatcher.dispatch(LogEvent::new(LogLevel::Debug, "burst", format!("{}", i)));
    }
    assert!(dispatcher.shutdown(Duration::from_secs(30)));

    let metrics = dispatcher.metrics();
    let seen = seen.lock();
    assert_eq!(metrics.total_emitted(), 1_000);
    assert_eq!(seen.len() as u64 + metrics.dropped_count(), 1_000);
    assert_eq!(seen.last().map(String::as_str), Some("999"));

    // surviving events stay in emission order
    let numbers: Vec<u32> = seen.iter().map(|m| m.parse().unwrap()).collect();
    assert!(numbers.windows(2).all(|w| w[0] < w[1]));
}

/// Test that shutdown drains everything queued into the tier files
#[test]
fn test_shutdown_drains_to_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = PipelineConfig::standard(temp_dir.path());
    config.sinks.retain(|s| matches!(s, SinkConfig::RotatingFile { .. }));
    config.queue.capacity = 50_000;
    let emitter = Arc::new(LogEmitter::from_config(config).expect("Failed to start"));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let emitter = Arc::clone(&emitter);
            thread::spawn(move || {
                let _scope = TaskScope::enter(format!("worker-{}", t));
                for i in 0..2_500 {
                    emitter.info("app.stress", format!("game_id={} tick {}", t, i));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert!(emitter.shutdown(Duration::from_secs(30)));
    assert_eq!(emitter.metrics().dropped_count(), 0);

    let engine_config = PipelineConfig::standard(temp_dir.path());
    let engine = LogQueryEngine::from_config(&engine_config);
    let page = engine.query("info.log", &FilterSpec::new().group_by(GroupBy::GameId), 1, 10);
    assert_eq!(page.total_records, 10_000);
    assert_eq!(page.total_groups, 4);
    for group in &page.groups {
        assert_eq!(group.records.len(), 2_500);
        let task = group.records[0].task_name.clone().unwrap();
        assert_eq!(task, format!("worker-{}", group.key));
    }
}

/// Test that emitting from many threads while shutting down never panics
#[test]
fn test_emit_races_shutdown() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Arc::new(
        Dispatcher::builder()
            .sink(CollectingSink(Arc::clone(&seen)))
            .capacity(64)
            .overflow_policy(OverflowPolicy::DropNewest)
            .build()
            .expect("Failed to build dispatcher"),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dispatcher = Arc::clone(&dispatcher);
            thread::spawn(move || {
                for i in 0..5_000 {
                    dispatcher.dispatch(LogEvent::new(LogLevel::Info, "race", format!("{}", i)));
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(5));
    assert!(dispatcher.shutdown(Duration::from_secs(10)));
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = dispatcher.metrics();
    assert_eq!(metrics.total_emitted(), 20_000);
    assert_eq!(
        seen.lock().len() as u64 + metrics.dropped_count(),
        metrics.total_emitted()
    );
}
