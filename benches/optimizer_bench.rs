//! Optimizer benchmarks using Criterion
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use sdv_orchestrator::optimizer::Optimizer;
use sdv_orchestrator::profile::WeightTable;
use sdv_orchestrator::reconciler::Reconciler;
use sdv_orchestrator::resources::FixedResourceProvider;
use sdv_orchestrator::vehicle::{StateRequirementMap, VehicleState};
use sdv_orchestrator::Catalog;

fn bench_plan_per_state(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let weights = WeightTable::default();
    let requirements = StateRequirementMap::builtin();
    let provider = FixedResourceProvider::always_ok();
    let optimizer = Optimizer::new(10.0, false);

    let mut group = c.benchmark_group("plan");
    for state in VehicleState::ALL {
        group.bench_with_input(
            BenchmarkId::from_parameter(state),
            &state,
            |b, &state| {
                b.iter(|| {
                    black_box(optimizer.plan(
                        state,
                        &catalog,
                        &weights,
                        &requirements,
                        &provider,
                    ))
                })
            },
        );
    }
    group.finish();
}

fn bench_plan_under_pressure(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let weights = WeightTable::default();
    let requirements = StateRequirementMap::builtin();
    let provider = FixedResourceProvider::always_ok();

    let mut group = c.benchmark_group("plan_capacity");
    for capacity in [2.0, 6.0, 10.0] {
        let optimizer = Optimizer::new(capacity, false);
        group.bench_with_input(
            BenchmarkId::from_parameter(capacity),
            &optimizer,
            |b, optimizer| {
                b.iter(|| {
                    black_box(optimizer.plan(
                        VehicleState::Charging,
                        &catalog,
                        &weights,
                        &requirements,
                        &provider,
                    ))
                })
            },
        );
    }
    group.finish();
}

fn bench_reconcile_diff(c: &mut Criterion) {
    let catalog = Catalog::builtin();
    let weights = WeightTable::default();
    let requirements = StateRequirementMap::builtin();
    let provider = FixedResourceProvider::always_ok();
    let optimizer = Optimizer::new(10.0, false);

    let mut reconciler = Reconciler::new();
    let driving = optimizer.plan(
        VehicleState::Driving,
        &catalog,
        &weights,
        &requirements,
        &provider,
    );
    let diff = reconciler.plan_diff(&driving);
    reconciler.commit(&diff, &[]);

    let charging = optimizer.plan(
        VehicleState::Charging,
        &catalog,
        &weights,
        &requirements,
        &provider,
    );

    c.bench_function("reconcile_diff", |b| {
        b.iter(|| black_box(reconciler.plan_diff(&charging)))
    });
}

fn bench_catalog_lookup(c: &mut Criterion) {
    let catalog = Catalog::builtin();

    c.bench_function("catalog_lookup", |b| {
        b.iter(|| {
            black_box(catalog.lookup("emergency_brake"));
            black_box(catalog.lookup("video_streaming"));
            black_box(catalog.lookup("missing_app"));
        })
    });
}

criterion_group!(
    benches,
    bench_plan_per_state,
    bench_plan_under_pressure,
    bench_reconcile_diff,
    bench_catalog_lookup,
);

criterion_main!(benches);
