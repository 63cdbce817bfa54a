//! Criterion benchmarks for `ft-combinatorics`.
//!
//! Catalog lookups sit on the model construction path; family generation and
//! dependent expansion run once per model.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ft_combinatorics::{dependent_subsets, subsets_for_window, subsets_order, NumberSetFamily};

fn bench_catalog(c: &mut Criterion) {
    let mut group = c.benchmark_group("catalog");

    for window in [5usize, 9, 13] {
        group.bench_with_input(BenchmarkId::new("cached_lookup", window), &window, |b, &w| {
            b.iter(|| black_box(subsets_for_window(black_box(w))));
        });

        let catalog = subsets_for_window(window).unwrap_or_default();
        group.bench_with_input(
            BenchmarkId::new("subsets_order_full", window),
            &window,
            |b, _| {
                b.iter(|| black_box(subsets_order(&catalog, catalog.len() - 1, 2)));
            },
        );
    }

    group.finish();
}

fn bench_families(c: &mut Criterion) {
    let mut group = c.benchmark_group("families");
    for family in NumberSetFamily::ALL {
        group.bench_with_input(BenchmarkId::new("sets", family), &family, |b, &f| {
            b.iter(|| black_box(f.sets(black_box(9), black_box(4))));
        });
    }
    group.bench_function("dependent_subsets_3x2", |b| {
        b.iter(|| black_box(dependent_subsets(black_box(&[0, 2, 4]), 2)));
    });
    group.finish();
}

criterion_group!(benches, bench_catalog, bench_families);
criterion_main!(benches);
