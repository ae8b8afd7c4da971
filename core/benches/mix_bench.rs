/// Criterion benchmarks for the batched mixing solver.
///
/// Measures forward solve latency and forward + backward cost across
/// embedding widths k = 8, 16, 32 at a fixed batch of 16 instances.
///
/// Run: cargo bench --bench mix_bench
/// Reports saved to: target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use satmix_core::config::{LayerConfig, SolverConfig};
use satmix_core::SatLayer;

const BATCH: usize = 16;

fn make_config(k: usize) -> LayerConfig {
    LayerConfig {
        n: 64,
        m: 128,
        aux: 16,
        k,
        weight_normalize: true,
        solver: SolverConfig::default(),
    }
}

fn make_input(n: usize) -> (Vec<f32>, Vec<bool>) {
    let is_input: Vec<bool> = (0..BATCH * n).map(|j| j % 4 != 3).collect();
    let z: Vec<f32> = (0..BATCH * n)
        .map(|j| if is_input[j] { (j % 7) as f32 / 7.0 } else { 0.0 })
        .collect();
    (z, is_input)
}

/// Forward solve only.
fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward");
    for k in [8, 16, 32] {
        let cfg = make_config(k);
        let (z, is_input) = make_input(cfg.n);
        let layer = SatLayer::new(cfg, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("solve", format!("k={k}")), &k, |b, _| {
            b.iter(|| black_box(layer.forward(&z, &is_input, BATCH, 7).unwrap()));
        });
    }
    group.finish();
}

/// Forward + backward, as in one training step.
fn bench_forward_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("forward_backward");
    for k in [8, 16, 32] {
        let cfg = make_config(k);
        let n = cfg.n;
        let (z, is_input) = make_input(n);
        let dz_out = vec![1.0f32; BATCH * n];
        let layer = SatLayer::new(cfg, 42).unwrap();

        group.bench_with_input(BenchmarkId::new("step", format!("k={k}")), &k, |b, _| {
            b.iter(|| {
                let (_, mut cache) = layer.forward(&z, &is_input, BATCH, 7).unwrap();
                black_box(layer.backward(&mut cache, &dz_out).unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_forward, bench_forward_backward);
criterion_main!(benches);
