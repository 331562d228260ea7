use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mor_explorer_gateway::application::aggregators::{bucket_daily_average, holder_distribution};
use mor_explorer_gateway::application::staking::{stake_info, staker_analysis};
use mor_explorer_gateway::domain::{HolderBalance, StakeEvent};

/// Hourly price samples over 30 days, as the price-history API returns them
fn benchmark_daily_bucketing(c: &mut Criterion) {
    let mut group = c.benchmark_group("daily_bucketing");

    let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default();
    let samples: Vec<(NaiveDate, f64)> = (0..30 * 24)
        .map(|hour| (start + Duration::days(hour / 24), 10.0 + (hour % 7) as f64))
        .collect();

    group.bench_function("bucket_daily_average_720", |b| {
        b.iter(|| {
            black_box(bucket_daily_average(samples.iter().copied()));
        });
    });

    group.finish();
}

fn benchmark_holder_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("holder_histogram");

    let balances: Vec<HolderBalance> = (0..50_000)
        .map(|i| HolderBalance {
            address: format!("0x{:040x}", i),
            amount: (i % 20_000) as f64 * 1.7,
        })
        .collect();

    group.bench_function("holder_distribution_50k", |b| {
        b.iter(|| {
            black_box(holder_distribution(&balances));
        });
    });

    group.finish();
}

fn benchmark_staking_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("staking_analysis");

    let base = 1_717_200_000_i64;
    let events: Vec<StakeEvent> = (0..10_000)
        .map(|i| StakeEvent {
            timestamp: base + i * 600,
            user: format!("0x{:040x}", i % 2_500),
            pool_id: (i % 2) as u32,
            amount: 100.0 + (i % 50) as f64,
            claim_lock_start: base + i * 600,
            claim_lock_end: base + i * 600 + (i % 400) * 86_400,
            multiplier: 1.0 + (i % 9) as f64 * 0.5,
            current_user_reward: 1.5,
            daily_reward: 0.1,
        })
        .collect();

    group.bench_function("staker_analysis_10k", |b| {
        b.iter(|| {
            black_box(staker_analysis(&events));
        });
    });

    group.bench_function("stake_info_10k", |b| {
        b.iter(|| {
            black_box(stake_info(&events));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_daily_bucketing,
    benchmark_holder_histogram,
    benchmark_staking_analysis
);
criterion_main!(benches);
