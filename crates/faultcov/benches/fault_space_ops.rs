//! Fault-space and set-cover benchmarks.
//!
//! Run with: `cargo bench --bench fault_space_ops`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use faultcov::{enumerate, greedy_cover, weighted_cover};
use std::collections::BTreeSet;

fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");

    for (bits, limit) in [(8, 2), (32, 1), (32, 2), (32, 3)] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{bits}b_{limit}")),
            &(bits, limit),
            |bench, &(b, l)| {
                bench.iter(|| black_box(enumerate(black_box(b), black_box(l))));
            },
        );
    }

    group.finish();
}

/// Overlapping synthetic coverage sets
fn synthetic_sets(programs: usize, faults: u32) -> Vec<BTreeSet<u32>> {
    (0..programs)
        .map(|p| {
            let stride = (p as u32 % 7) + 1;
            (0..faults).filter(|f| (f + p as u32) % stride == 0).collect()
        })
        .collect()
}

fn bench_set_cover(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_cover");

    for programs in [10, 50, 200] {
        let sets = synthetic_sets(programs, 2000);
        let weights: Vec<f64> = (0..programs).map(|i| 1.0 + (i % 5) as f64).collect();

        group.bench_with_input(BenchmarkId::new("greedy", programs), &sets, |bench, s| {
            bench.iter(|| black_box(greedy_cover(s)));
        });
        group.bench_with_input(BenchmarkId::new("weighted", programs), &sets, |bench, s| {
            bench.iter(|| black_box(weighted_cover(s, &weights)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enumerate, bench_set_cover);
criterion_main!(benches);
