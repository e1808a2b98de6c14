//! # Classifier and Aggregator Benchmarks
//!
//! Measures the per-record cost of the probabilistic classifier and the
//! threshold aggregator, the two hot primitives of every stage tick.
//!
//! Run: `cargo bench --bench classifier_bench`

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use sema_core::{Aggregator, Classifier, Symbol, alphabet};

/// Benchmark classifier draws
fn bench_classifier(c: &mut Criterion) {
    let mut group = c.benchmark_group("classifier");

    let classifier = Classifier::new(0.5).unwrap();
    let symbol = Symbol::data('A').unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    group.bench_function("classify", |b| {
        b.iter(|| black_box(classifier.classify(&mut rng, &symbol).unwrap()))
    });

    group.bench_function("greek_lookup", |b| {
        b.iter(|| black_box(alphabet::greek_of('Q')))
    });

    group.bench_function("channel_lookup", |b| {
        b.iter(|| black_box(alphabet::channel_of('Z')))
    });

    group.finish();
}

/// Benchmark aggregation offers
fn bench_aggregator(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator");

    group.bench_function("offer", |b| {
        let mut aggregator = Aggregator::new(9);
        b.iter(|| black_box(aggregator.offer('A').unwrap()))
    });

    group.bench_function("offer_across_alphabet", |b| {
        let mut aggregator = Aggregator::new(9);
        b.iter(|| {
            for &value in alphabet::ALPHABET.iter() {
                black_box(aggregator.offer(value).unwrap());
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_classifier, bench_aggregator);
criterion_main!(benches);
