// Matrix power and bridge sampling throughput.
//
// Uses dense random column-stochastic chains: 24 chords (typical corpus),
// 96 chords (a large vocabulary). Exponents cover one
// long phrase span, and interior fill is measured per mode.

use std::hint::black_box;

use chord_bridge::bridge::{BridgeSampler, GenerationRequest, InteriorMode};
use chord_bridge::matrix::Matrix;
use chord_bridge::power::{PowerCache, matrix_power};
use chord_bridge::transition::TransitionMatrix;
use chord_bridge_prng::{BridgeRng, RandomSource};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn random_chain(size: usize, seed: u64) -> Matrix {
    let mut rng = BridgeRng::new(seed);
    let mut m = Matrix::zeros(size);
    for from in 0..size {
        let weights: Vec<f64> = (0..size).map(|_| rng.next_f64() + 0.01).collect();
        let total: f64 = weights.iter().sum();
        for (to, w) in weights.iter().enumerate() {
            m.set(to, from, w / total);
        }
    }
    m
}

fn bench_matrix_power(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_power");
    for size in [24, 96] {
        let m = random_chain(size, 7);
        for k in [7, 31] {
            group.bench_with_input(BenchmarkId::new(format!("n{size}"), k), &k, |b, &k| {
                b.iter(|| black_box(matrix_power(&m, k)));
            });
        }
        // Bridge access pattern: every split (p, span - p) of a 16-step span.
        group.bench_function(BenchmarkId::new("cached_splits", size), |b| {
            b.iter(|| {
                let mut cache = PowerCache::new(&m);
                for p in 1..16 {
                    let (left, right) = cache.pair(p, 16 - p);
                    black_box((left.get(0, 0), right.get(0, 0)));
                }
                cache.multiplications()
            });
        });
    }
    group.finish();
}

fn bench_interior_fill(c: &mut Criterion) {
    let mut group = c.benchmark_group("interior_fill");
    let chain = match TransitionMatrix::from_matrix(random_chain(24, 11)) {
        Ok(chain) => chain,
        Err(e) => panic!("random chain is stochastic: {e}"),
    };
    let request = GenerationRequest::new(0, 5, 15);
    for mode in [InteriorMode::Marginal, InteriorMode::Sequential, InteriorMode::Bisection] {
        group.bench_function(BenchmarkId::new("span15", mode), |b| {
            let mut rng = BridgeRng::new(3);
            b.iter(|| {
                let mut sampler = BridgeSampler::new(&chain);
                black_box(sampler.sample_interior(&request, mode, &mut rng))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_matrix_power, bench_interior_fill);
criterion_main!(benches);
