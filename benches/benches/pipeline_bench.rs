//! # Pipeline Benchmarks
//!
//! Measures admission throughput of the capacity ledger and the cost of a
//! full manual sweep over all seven stages.
//!
//! Run: `cargo bench --bench pipeline_bench`

use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use sema_capacity::{CapacityManager, FixedOracle, TokenClass};
use sema_pipeline::{PipelineConfig, StageId, SymbolPipeline};

/// Benchmark ledger admissions
fn bench_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("capacity");

    group.bench_function("try_admit_release", |b| {
        let manager = CapacityManager::new(Arc::new(FixedOracle::new(1_000_000.0)));
        b.iter(|| {
            manager.try_admit(TokenClass::Data, None).unwrap();
            manager.release(TokenClass::Data, None).unwrap();
        })
    });

    group.bench_function("snapshot", |b| {
        let manager = CapacityManager::new(Arc::new(FixedOracle::new(1000.0)));
        for _ in 0..100 {
            manager.try_admit(TokenClass::Data, None).unwrap();
        }
        b.iter(|| black_box(manager.snapshot().unwrap()))
    });

    group.finish();
}

/// Benchmark full stage sweeps
fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");

    for rate in [10.0, 100.0].iter() {
        group.bench_with_input(BenchmarkId::new("all_stages", rate), rate, |b, &rate| {
            let mut config = PipelineConfig::default();
            config.generator_rate = rate;
            config.uptake_rate = rate;
            config.pool_rate = rate;
            config.converter_rate = rate;
            config.intake_rate = rate;
            config.initial_side = 10_000.0;

            let mut pipeline = SymbolPipeline::new(config).unwrap();
            b.iter(|| {
                for stage in StageId::all() {
                    black_box(pipeline.tick_stage(stage, Duration::from_secs(1)));
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_capacity, bench_sweep);
criterion_main!(benches);
