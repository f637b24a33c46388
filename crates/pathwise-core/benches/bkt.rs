use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pathwise_core::bkt::{bkt_update, maintenance_completion, BktParameters};
use pathwise_core::model::{EvaluationMode, ScenarioCorrectness};
use pathwise_core::results::{derive_correctness, ScenarioEvaluationResult};
use uuid::Uuid;

const PARAMS: BktParameters = BktParameters {
    p_slip: 0.1,
    p_guess: 0.2,
    p_transit: 0.15,
};

fn bench_bkt_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("bkt_update");

    group.bench_function("correct", |b| {
        b.iter(|| bkt_update(black_box(0.4), black_box(PARAMS), black_box(true)))
    });

    group.bench_function("incorrect", |b| {
        b.iter(|| bkt_update(black_box(0.4), black_box(PARAMS), black_box(false)))
    });

    group.bench_function("100 responses", |b| {
        b.iter(|| {
            (0..100).fold(0.1, |p_ln, i| {
                bkt_update(black_box(p_ln), PARAMS, i % 3 != 0).p_ln
            })
        })
    });

    group.finish();
}

fn bench_maintenance(c: &mut Criterion) {
    let mut group = c.benchmark_group("maintenance_completion");
    let window: Vec<f64> = (0..50).map(|i| 0.5 + (i as f64) / 100.0).collect();

    group.bench_function("maintain_for=3", |b| {
        b.iter(|| maintenance_completion(black_box(&window), black_box(3), black_box(0.8)))
    });

    group.bench_function("maintain_for=50", |b| {
        b.iter(|| maintenance_completion(black_box(&window), black_box(50), black_box(0.8)))
    });

    group.finish();
}

fn bench_correctness(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_correctness");
    let results: Vec<ScenarioEvaluationResult> = (0..32)
        .map(|i| ScenarioEvaluationResult {
            scenario_id: Uuid::nil(),
            evaluation_result: i % 2 == 0,
            scenario_correctness: Some(if i % 5 == 0 {
                ScenarioCorrectness::Incorrect
            } else {
                ScenarioCorrectness::Correct
            }),
            actions: vec![],
        })
        .collect();

    group.bench_function("first-match", |b| {
        b.iter(|| derive_correctness(black_box(EvaluationMode::Default), black_box(&results)))
    });

    group.bench_function("combined", |b| {
        b.iter(|| derive_correctness(black_box(EvaluationMode::Combined), black_box(&results)))
    });

    group.finish();
}

criterion_group!(benches, bench_bkt_update, bench_maintenance, bench_correctness);
criterion_main!(benches);
