//! Benchmarks for accumulator updates and flow queries.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use flowmeter::{Accumulator, ManualClock};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use std::time::Duration;

fn update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for updates in &[1_000_u64, 10_000, 100_000] {
        group.throughput(Throughput::Elements(*updates));
        group.bench_with_input(
            BenchmarkId::from_parameter(updates),
            updates,
            |b, &updates| {
                b.iter(|| {
                    let mut rng = SmallRng::seed_from_u64(19690716);
                    let clock = ManualClock::default();
                    let acc = Accumulator::with_clock(0, Duration::from_secs(60), clock.clone());
                    for _ in 0..updates {
                        clock.advance(Duration::from_millis(rng.random_range(0..250)));
                        acc.update(rng.random_range(1..50));
                    }
                });
            },
        );
    }
    group.finish();
}

fn flow(c: &mut Criterion) {
    let mut group = c.benchmark_group("flow");
    for retained in &[10_u64, 1_000, 10_000] {
        let clock = ManualClock::default();
        let acc = Accumulator::with_clock(0, Duration::from_secs(3_600), clock.clone());
        for _ in 0..*retained {
            clock.advance(Duration::from_millis(100));
            acc.update(25);
        }
        group.bench_with_input(BenchmarkId::from_parameter(retained), retained, |b, _| {
            b.iter(|| acc.flow(Duration::from_secs(60)).expect("non-zero window"));
        });
    }
    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(10));
    targets = update, flow,
);
criterion_main!(benches);
