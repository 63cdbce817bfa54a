//! Criterion benchmarks for the training hot path in `ft-core`.
//!
//! `train_focus` fans one example out to every number set; `train_parallel`
//! spreads a batch over scoped threads; `encode` runs once per set per frame.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ft_config::TrainerConfig;
use ft_core::encoding::encode;
use ft_core::train::{Example, Frame, Model, TrainingAggregator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random token stream over a small vocabulary so contexts repeat.
fn examples(window: usize, focus: usize, n: usize, vocab: i32) -> Vec<Example> {
    let mut rng = StdRng::seed_from_u64(7);
    let seq: Vec<i32> = (0..n + 1).map(|_| rng.random_range(2000..2000 + vocab)).collect();
    (0..n)
        .map(|p| Example::new(Frame::from_sequence(&seq, p, window, focus), seq[p + 1] as i64))
        .collect()
}

fn config(window: usize) -> TrainerConfig {
    TrainerConfig {
        window_size: window,
        focus: window / 2,
        ..TrainerConfig::default()
    }
}

fn bench_train_focus(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_focus");
    for window in [3usize, 5, 7] {
        let data = examples(window, window / 2, 1_000, 50);
        group.bench_with_input(BenchmarkId::new("window", window), &data, |b, data| {
            b.iter(|| {
                let model = Model::new(config(window)).unwrap();
                let agg = TrainingAggregator::new(&model);
                for ex in data {
                    black_box(agg.train_focus(&ex.frame, &ex.values).unwrap());
                }
            })
        });
    }
    group.finish();
}

fn bench_train_parallel(c: &mut Criterion) {
    let mut group = c.benchmark_group("train_parallel");
    group.sample_size(20);
    let data = examples(5, 2, 10_000, 200);
    for workers in [1usize, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, &w| {
            b.iter(|| {
                let model = Model::new(config(5)).unwrap();
                black_box(TrainingAggregator::new(&model).train_parallel(&data, w).unwrap());
            })
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    for len in [1usize, 2, 5, 9] {
        let values: Vec<i32> = (0..len as i32).map(|i| 1_000 + i * 37).collect();
        group.bench_with_input(BenchmarkId::new("len", len), &values, |b, v| {
            b.iter(|| black_box(encode(black_box(v))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train_focus, bench_train_parallel, bench_encode);
criterion_main!(benches);
