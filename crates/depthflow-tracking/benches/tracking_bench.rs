//! Criterion benchmarks for depthflow-tracking.
//!
//! Two axes:
//!
//! - **Hungarian**: `solve()` on square and wide random matrices
//! - **Tick**: one `Tracker::track` / `ClusterMerger::merge` tick at varying
//!   cluster counts
//!
//! Run with: `cargo bench -p depthflow-tracking`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use depthflow_tracking::hungarian::{CostMatrix, solve};
use depthflow_tracking::{Cluster, ClusterMerger, MergerConfig, Tracker, TrackerConfig, Vec3};

const SIZES: &[usize] = &[4, 16, 64];

/// Cheap deterministic pseudo-random value in [0, 1).
fn noise(i: usize, salt: usize) -> f32 {
    let h = (i as u32)
        .wrapping_mul(2_654_435_761)
        .wrapping_add((salt as u32).wrapping_mul(97_531));
    (h % 10_000) as f32 / 10_000.0
}

/// `n` identified clusters on a grid with 0.5 m spacing, shifted by `offset`.
fn grid(n: usize, offset: f32) -> Vec<Cluster> {
    (0..n)
        .map(|i| {
            let x = (i % 8) as f32 * 0.5 + offset;
            let y = (i / 8) as f32 * 0.5;
            let mut c = Cluster::at(Vec3::new(x, y, 1.0));
            c.id = i as u32 + 1;
            c
        })
        .collect()
}

fn bench_hungarian(c: &mut Criterion) {
    let mut group = c.benchmark_group("hungarian");

    for &n in SIZES {
        let square = CostMatrix::from_fn(n, n, |i, j| f64::from(noise(i * n + j, 1)));
        group.bench_with_input(BenchmarkId::new("square", n), &square, |b, m| {
            b.iter(|| black_box(solve(black_box(m))));
        });

        let wide = CostMatrix::from_fn(n, n * 2, |i, j| f64::from(noise(i * n + j, 2)));
        group.bench_with_input(BenchmarkId::new("wide", n), &wide, |b, m| {
            b.iter(|| black_box(solve(black_box(m))));
        });
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    let config = TrackerConfig::default();
    let merge = MergerConfig::default();

    for &n in SIZES {
        group.bench_function(BenchmarkId::new("tracker", n), |b| {
            let mut tracker = Tracker::new();
            tracker.track(grid(n, 0.0), &config, 0.0);
            let mut now = 0.0;
            b.iter(|| {
                now += 1.0 / 30.0;
                let shift = noise(now as usize, 3) * 0.05;
                black_box(tracker.track(grid(n, shift), &config, now).len())
            });
        });

        group.bench_function(BenchmarkId::new("merger", n), |b| {
            let a = grid(n, 0.0);
            let s = grid(n, 0.05);
            let mut merger = ClusterMerger::new();
            let mut now = 0.0;
            b.iter(|| {
                now += 1.0 / 30.0;
                black_box(merger.merge(&[a.as_slice(), s.as_slice()], &merge, now).len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hungarian, bench_tick);
criterion_main!(benches);
