use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use emberhost::console::MessageLog;
use emberhost::schedule::{Scheduler, Task};

/// Benchmark queue-and-drain throughput of the main tick
fn bench_main_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("main_queue");

    for batch in &[16usize, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(batch), batch, |b, &batch| {
            let log = Arc::new(MessageLog::new());
            let scheduler = Scheduler::new(log);

            b.iter(|| {
                for _ in 0..batch {
                    scheduler.queue_on_main(Task::new(|| {
                        black_box(1 + 1);
                    }));
                }
                scheduler.tick();
            });
        });
    }

    group.finish();
}

/// Benchmark log append cost, including block eviction
fn bench_log_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("log_append");

    group.bench_function("append_with_eviction", |b| {
        let log = MessageLog::new();
        b.iter(|| {
            log.log(black_box("a log line of typical length for a console"));
        });
    });

    group.bench_function("snapshot_500", |b| {
        let log = MessageLog::new();
        for i in 0..500 {
            log.log(format!("entry {i}"));
        }
        b.iter(|| black_box(log.snapshot().len()));
    });

    group.finish();
}

criterion_group!(benches, bench_main_queue, bench_log_append);
criterion_main!(benches);
