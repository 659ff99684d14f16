//! Criterion benchmarks for tiered_log_pipeline

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Write;
use tiered_log_pipeline::core::LogTarget;
use tiered_log_pipeline::prelude::*;

/// Accepts everything and does nothing
struct NullSink;

impl Sink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }

    fn write(&mut self, record: &PersistedRecord) -> Result<()> {
        black_box(record);
        Ok(())
    }
}

// ============================================================================
// Formatting
// ============================================================================

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    group.throughput(Throughput::Elements(1));

    let formatter = RecordFormatter::new();
    let event = LogEvent::new(LogLevel::Error, "app.matchmaking", "game_id=42 player=7 timeout")
        .at(CallSite::new("app::matchmaking", "sweep", 120))
        .with_field("game_id", 42)
        .with_field("player_id", 7);

    group.bench_function("format_record", |b| {
        b.iter(|| black_box(formatter.format(black_box(&event))));
    });

    group.bench_function("format_line", |b| {
        b.iter(|| black_box(formatter.format_line(black_box(&event))));
    });

    let line = formatter.format_line(&event).unwrap();
    group.bench_function("parse_line", |b| {
        b.iter(|| black_box(PersistedRecord::parse_line(black_box(&line))));
    });

    group.finish();
}

// ============================================================================
// Emission
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(1));

    let dispatcher = Dispatcher::builder()
        .sink(NullSink)
        .capacity(100_000)
        .overflow_policy(OverflowPolicy::DropNewest)
        .build()
        .unwrap();

    group.bench_function("dispatch_null_sink", |b| {
        b.iter(|| {
            dispatcher.dispatch(LogEvent::new(LogLevel::Info, "app.bench", black_box("tick")));
        });
    });

    dispatcher.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    group.finish();
}

fn bench_rotating_file(c: &mut Criterion) {
    let mut group = c.benchmark_group("rotating_file");
    group.throughput(Throughput::Elements(1));

    let dir = tempfile::tempdir().unwrap();
    let policy = RotationPolicy::new().with_max_bytes(1024 * 1024).with_backup_count(2);
    let mut sink = RotatingFileSink::new(dir.path().join("bench.log"), LogLevel::Debug, policy).unwrap();
    let record = RecordFormatter::new().format(&LogEvent::new(LogLevel::Info, "app.bench", "tick"));

    group.bench_function("write_with_rotation", |b| {
        b.iter(|| sink.write(black_box(&record)).unwrap());
    });

    group.finish();
}

// ============================================================================
// Query
// ============================================================================

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for size in [1_000usize, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("info.log");
        let mut file = std::fs::File::create(&path).unwrap();
        let formatter = RecordFormatter::new();
        for i in 0..size {
            let event = LogEvent::new(
                LogLevel::Info,
                if i % 2 == 0 { "app.game" } else { "app.ws" },
                format!("game_id={} player={} moved", i % 50, i % 7),
            );
            writeln!(file, "{}", formatter.format_line(&event).unwrap()).unwrap();
        }
        drop(file);

        let engine = LogQueryEngine::new(vec![LogTarget {
            name: "info.log".to_string(),
            path,
        }]);
        let filter = FilterSpec::new()
            .group_by(GroupBy::GameId)
            .keyword("moved")
            .logger("app.game");

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("group_by_game", size), &size, |b, _| {
            b.iter(|| black_box(engine.query("info.log", &filter, 1, 10)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_formatting, bench_dispatch, bench_rotating_file, bench_query);
criterion_main!(benches);
