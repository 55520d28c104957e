//! Quorum safe-zone evaluation benchmarks.
//!
//! Raw mode is a sort; eikonal mode enumerates C(|L|, m) subsets, so the
//! quorum sweep shows where the exhaustive search starts to dominate.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sketchzone_core::{EvaluationMode, QuorumSafezone};

fn vectors(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(0xBE7C);
    let reference = (0..n).map(|_| rng.gen_range(0.1..2.0)).collect();
    let candidate = (0..n).map(|_| rng.gen_range(-1.0..2.0)).collect();
    (reference, candidate)
}

fn bench_raw(c: &mut Criterion) {
    let (reference, candidate) = vectors(15);
    let mut zone = QuorumSafezone::with_reference(&reference, 8, EvaluationMode::Raw)
        .expect("all reference entries are positive");
    c.bench_function("evaluate_raw_n15_k8", |b| {
        b.iter(|| criterion::black_box(zone.evaluate(criterion::black_box(&candidate))));
    });
}

fn bench_eikonal_quorum_sweep(c: &mut Criterion) {
    let (reference, candidate) = vectors(11);
    let mut group = c.benchmark_group("evaluate_eikonal_n11");
    for k in [1, 4, 6, 8, 11] {
        let mut zone = QuorumSafezone::with_reference(&reference, k, EvaluationMode::Eikonal)
            .expect("all reference entries are positive");
        group.bench_with_input(BenchmarkId::from_parameter(k), &candidate, |b, candidate| {
            b.iter(|| criterion::black_box(zone.evaluate(candidate)));
        });
    }
    group.finish();
}

fn bench_prepare(c: &mut Criterion) {
    let (reference, _) = vectors(31);
    let mut zone = QuorumSafezone::with_mode(EvaluationMode::Eikonal);
    c.bench_function("prepare_n31_k16", |b| {
        b.iter(|| {
            zone.prepare(criterion::black_box(&reference), 16)
                .expect("all reference entries are positive");
        });
    });
}

criterion_group!(benches, bench_raw, bench_eikonal_quorum_sweep, bench_prepare);
criterion_main!(benches);
