//! Benchmarks for HealthLens analytics
//!
//! Run with: cargo bench

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use healthlens::analysis::stats::{correlation_p_value, regularized_incomplete_beta};
use healthlens::analysis::{granger_test, AnalyticsEngine, CorrelationEngine, AnalyticsConfig};
use healthlens::metrics::{DailyMetrics, MetricId};

/// Nutrition and wearable mappings with a mild sugar → sleep relation
fn create_test_days(count: usize) -> (DailyMetrics, DailyMetrics) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut nutrition = DailyMetrics::new();
    let mut wearable = DailyMetrics::new();

    for i in 0..count {
        let date = start + Duration::days(i as i64);
        let sugar = 20.0 + ((i * 7) % 11) as f64 * 5.0;
        nutrition.insert(date, MetricId::Calories, 1900.0 + ((i * 3) % 7) as f64 * 60.0);
        nutrition.insert(date, MetricId::ProteinG, 80.0 + (i % 5) as f64 * 6.0);
        nutrition.insert(date, MetricId::SugarG, sugar);
        nutrition.insert(date, MetricId::FiberG, 18.0 + (i % 4) as f64 * 3.0);
        nutrition.insert(date, MetricId::SodiumMg, 2000.0 + (i % 6) as f64 * 150.0);

        wearable.insert(date, MetricId::SleepScore, 92.0 - sugar * 0.3 + (i % 3) as f64);
        wearable.insert(date, MetricId::ReadinessScore, 70.0 + (i % 9) as f64);
        wearable.insert(date, MetricId::HrvBalance, 55.0 + (i % 8) as f64 * 2.0);
        wearable.insert(date, MetricId::Steps, 6000.0 + ((i * 5) % 13) as f64 * 400.0);
    }

    (nutrition, wearable)
}

fn bench_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats");

    group.bench_function("incomplete_beta", |b| {
        b.iter(|| regularized_incomplete_beta(black_box(0.37), black_box(14.0), black_box(0.5)))
    });

    group.bench_function("correlation_p_value", |b| {
        b.iter(|| correlation_p_value(black_box(-0.52), black_box(30)))
    });

    let x: Vec<f64> = (0..90).map(|i| ((i * 7) % 11) as f64).collect();
    let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| v * 0.5 + (i % 3) as f64).collect();
    group.bench_function("granger_90", |b| {
        b.iter(|| granger_test(black_box(&x), black_box(&y)))
    });

    group.finish();
}

fn bench_correlations(c: &mut Criterion) {
    let mut group = c.benchmark_group("correlations");

    for days in [30, 90, 365] {
        let (nutrition, wearable) = create_test_days(days);
        let engine = CorrelationEngine::new(AnalyticsConfig::default());

        group.throughput(Throughput::Elements(days as u64));
        group.bench_function(format!("calculate_all_{}", days), |b| {
            b.iter(|| engine.calculate_all(black_box(&nutrition), black_box(&wearable)))
        });
    }

    group.finish();
}

fn bench_full_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");
    group.sample_size(20);

    let (nutrition, wearable) = create_test_days(90);
    let engine = AnalyticsEngine::default();

    group.bench_function("analyze_90_days", |b| {
        b.iter(|| engine.analyze(black_box(&nutrition), black_box(&wearable)))
    });

    group.finish();
}

criterion_group!(benches, bench_stats, bench_correlations, bench_full_analysis);
criterion_main!(benches);
