//! Staking statistics over the stake-event history and the emission schedule.

use crate::application::aggregators::{bucket_counts, Bucket};
use crate::domain::{
    EmissionDay, EmissionSnapshot, Histogram, MultiplierAnalysis, PoolRewardRate, PoolRewardSummary,
    RewardRates, StakeEvent, StakeInfo, StakerAnalysis, StakingMetrics,
};
use crate::infrastructure::abi::round4;
use chrono::{DateTime, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

pub const CAPITAL_POOL: u32 = 0;
pub const CODE_POOL: u32 = 1;

const SECS_PER_DAY: i64 = 86_400;

pub const STAKE_TIME_BUCKETS: [Bucket; 7] = [
    Bucket::new("0-30", 0.0, 30.0),
    Bucket::new("30-90", 30.0, 90.0),
    Bucket::new("90-180", 90.0, 180.0),
    Bucket::new("180-365", 180.0, 365.0),
    Bucket::new("365-730", 365.0, 730.0),
    Bucket::new("730-1095", 730.0, 1095.0),
    Bucket::new("1095+", 1095.0, f64::INFINITY),
];

pub const MULTIPLIER_BUCKETS: [Bucket; 7] = [
    Bucket::new("<1", f64::NEG_INFINITY, 1.0),
    Bucket::new("1-1.5", 1.0, 1.5),
    Bucket::new("1.5-2", 1.5, 2.0),
    Bucket::new("2-3", 2.0, 3.0),
    Bucket::new("3-5", 3.0, 5.0),
    Bucket::new("5-8", 5.0, 8.0),
    Bucket::new("8+", 8.0, f64::INFINITY),
];

fn pool_key(pool_id: u32) -> String {
    format!("pool_{}", pool_id)
}

fn event_date(event: &StakeEvent) -> Option<NaiveDate> {
    DateTime::from_timestamp(event.timestamp, 0).map(|t| t.date_naive())
}

fn lock_secs(event: &StakeEvent) -> i64 {
    (event.claim_lock_end - event.claim_lock_start).max(0)
}

/// Each user's latest event per pool.
pub fn current_positions(events: &[StakeEvent]) -> Vec<&StakeEvent> {
    let mut latest: BTreeMap<(u32, &str), &StakeEvent> = BTreeMap::new();
    for event in events {
        latest
            .entry((event.pool_id, event.user.as_str()))
            .and_modify(|held| {
                if event.timestamp >= held.timestamp {
                    *held = event;
                }
            })
            .or_insert(event);
    }
    latest.into_values().collect()
}

/// Render whole seconds the way `N days, H:MM:SS` durations read.
pub fn format_duration(total_secs: i64) -> String {
    let total_secs = total_secs.max(0);
    let days = total_secs / SECS_PER_DAY;
    let rem = total_secs % SECS_PER_DAY;
    let clock = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values.into_iter().fold((0.0, 0u64), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

pub fn staker_analysis(events: &[StakeEvent]) -> StakerAnalysis {
    let mut daily: BTreeMap<NaiveDate, BTreeMap<u32, BTreeSet<&str>>> = BTreeMap::new();
    let mut daily_combined: BTreeMap<NaiveDate, BTreeSet<&str>> = BTreeMap::new();
    let mut all_pools: BTreeMap<u32, BTreeSet<&str>> = BTreeMap::new();
    let mut all_users: BTreeSet<&str> = BTreeSet::new();

    for event in events {
        all_pools.entry(event.pool_id).or_default().insert(event.user.as_str());
        all_users.insert(event.user.as_str());
        if let Some(date) = event_date(event) {
            daily
                .entry(date)
                .or_default()
                .entry(event.pool_id)
                .or_default()
                .insert(event.user.as_str());
            daily_combined.entry(date).or_default().insert(event.user.as_str());
        }
    }

    let daily_unique_stakers = daily
        .into_iter()
        .map(|(date, pools)| {
            let mut counts: BTreeMap<String, u64> = pools
                .iter()
                .map(|(pool, users)| (pool_key(*pool), users.len() as u64))
                .collect();
            let combined = daily_combined.get(&date).map(|u| u.len()).unwrap_or(0);
            counts.insert("combined".to_string(), combined as u64);
            (date, counts)
        })
        .collect();

    let mut total_unique_stakers: BTreeMap<String, u64> = all_pools
        .iter()
        .map(|(pool, users)| (pool_key(*pool), users.len() as u64))
        .collect();
    total_unique_stakers.insert("combined".to_string(), all_users.len() as u64);

    let positions = current_positions(events);
    let mut by_pool: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for position in &positions {
        by_pool
            .entry(position.pool_id)
            .or_default()
            .push(lock_secs(position) as f64);
    }
    let average_stake_time = by_pool
        .iter()
        .map(|(pool, spans)| (pool.to_string(), format_duration(mean(spans.iter().copied()).round() as i64)))
        .collect();
    let combined = mean(positions.iter().map(|p| lock_secs(p) as f64));

    StakerAnalysis {
        daily_unique_stakers,
        total_unique_stakers,
        average_stake_time,
        combined_average_stake_time: format_duration(combined.round() as i64),
    }
}

pub fn multiplier_analysis(events: &[StakeEvent]) -> MultiplierAnalysis {
    let positions = current_positions(events);
    let pool_mean = |pool: u32| {
        round4(mean(
            positions
                .iter()
                .filter(|p| p.pool_id == pool)
                .map(|p| p.multiplier),
        ))
    };
    MultiplierAnalysis {
        overall_average: round4(mean(positions.iter().map(|p| p.multiplier))),
        capital_average: pool_mean(CAPITAL_POOL),
        code_average: pool_mean(CODE_POOL),
    }
}

/// Per-pool totals over current positions, keyed by pool id.
pub fn pool_rewards_summary(events: &[StakeEvent]) -> BTreeMap<String, PoolRewardSummary> {
    let mut summaries: BTreeMap<u32, PoolRewardSummary> = BTreeMap::new();
    for position in current_positions(events) {
        let summary = summaries.entry(position.pool_id).or_insert(PoolRewardSummary {
            stakers: 0,
            total_staked: 0.0,
            daily_reward_sum: 0.0,
            total_current_user_reward_sum: 0.0,
        });
        summary.stakers += 1;
        summary.total_staked += position.amount;
        summary.daily_reward_sum += position.daily_reward;
        summary.total_current_user_reward_sum += position.current_user_reward;
    }
    summaries
        .into_iter()
        .map(|(pool, mut s)| {
            s.total_staked = round4(s.total_staked);
            s.daily_reward_sum = round4(s.daily_reward_sum);
            s.total_current_user_reward_sum = round4(s.total_current_user_reward_sum);
            (pool.to_string(), s)
        })
        .collect()
}

/// The schedule row for `today` (or the latest one before it) and the running totals through it.
pub fn emission_snapshot(schedule: &[EmissionDay], today: NaiveDate) -> EmissionSnapshot {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    let mut current: Option<&EmissionDay> = None;

    let mut days: Vec<&EmissionDay> = schedule.iter().filter(|day| day.date <= today).collect();
    days.sort_by_key(|day| day.date);
    for day in days {
        for (category, amount) in &day.emissions {
            *totals.entry(category.clone()).or_insert(0.0) += amount;
        }
        current = Some(day);
    }

    match current {
        Some(day) => EmissionSnapshot {
            date: Some(day.date),
            new_emissions: day
                .emissions
                .iter()
                .map(|(category, amount)| (category.clone(), round4(*amount)))
                .collect(),
            total_emissions: totals.into_iter().map(|(c, v)| (c, round4(v))).collect(),
        },
        None => EmissionSnapshot {
            date: None,
            new_emissions: BTreeMap::new(),
            total_emissions: BTreeMap::new(),
        },
    }
}

fn histogram<I: IntoIterator<Item = f64>>(values: I, buckets: &[Bucket]) -> Histogram {
    Histogram {
        ranges: buckets.iter().map(|b| b.label.to_string()).collect(),
        frequencies: bucket_counts(values, buckets),
    }
}

/// Stake-time (days) and power-multiplier histograms over current positions.
pub fn stake_info(events: &[StakeEvent]) -> StakeInfo {
    let positions = current_positions(events);
    StakeInfo {
        stake_time: histogram(
            positions.iter().map(|p| lock_secs(p) as f64 / SECS_PER_DAY as f64),
            &STAKE_TIME_BUCKETS,
        ),
        power_multiplier: histogram(positions.iter().map(|p| p.multiplier), &MULTIPLIER_BUCKETS),
    }
}

/// Today's emission per pool divided by what the pool has staked.
pub fn reward_rates(
    events: &[StakeEvent],
    schedule: &[EmissionDay],
    pool_columns: &BTreeMap<u32, String>,
    today: NaiveDate,
) -> RewardRates {
    let snapshot = emission_snapshot(schedule, today);
    let summaries = pool_rewards_summary(events);

    let pools = pool_columns
        .iter()
        .map(|(pool, column)| {
            let daily_emission = snapshot.new_emissions.get(column).copied().unwrap_or(0.0);
            let total_staked = summaries
                .get(&pool.to_string())
                .map(|s| s.total_staked)
                .unwrap_or(0.0);
            let daily_reward_per_token = if total_staked > 0.0 {
                daily_emission / total_staked
            } else {
                0.0
            };
            (
                pool_key(*pool),
                PoolRewardRate {
                    emission_column: column.clone(),
                    daily_emission,
                    total_staked,
                    daily_reward_per_token,
                },
            )
        })
        .collect();

    RewardRates {
        date: snapshot.date.unwrap_or(today),
        pools,
    }
}

pub fn staking_metrics(events: &[StakeEvent], schedule: &[EmissionDay], today: NaiveDate) -> StakingMetrics {
    StakingMetrics {
        staker_analysis: staker_analysis(events),
        multiplier_analysis: multiplier_analysis(events),
        stakereward_analysis: pool_rewards_summary(events),
        emissionreward_analysis: emission_snapshot(schedule, today),
    }
}
