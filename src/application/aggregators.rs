//! Metric aggregators: adapter output in, cache-ready documents out.
//!
//! The synchronous functions here are pure. The async ones only sequence
//! adapter calls and hand the results to a pure function.

use crate::domain::{
    BlockClock, ChainSource, CirculatingSupplyRow, DailyValues, HolderBalance, HolderDistribution,
    LockedAndBurned, LockedBurnedSeries, BurntMor, LockedMor, MarketCap, MarketSource, PriceHistory,
    PricesAndVolume, RangeCounts, SupplyDataPoint, SupplyGroup, SupplyResponse,
};
use crate::infrastructure::abi::round4;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Length of the circulating-supply series.
pub const CIRC_SUPPLY_DAYS: usize = 30;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Balances at or below this are dust.
pub const DUST_THRESHOLD: f64 = 0.001;

/// A half-open `[min, max)` bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

impl Bucket {
    pub const fn new(label: &'static str, min: f64, max: f64) -> Self {
        Self { label, min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value < self.max
    }
}

pub const HOLDER_RANGES: [Bucket; 7] = [
    Bucket::new("0-50", 0.0, 50.0),
    Bucket::new("50-100", 50.0, 100.0),
    Bucket::new("100-200", 100.0, 200.0),
    Bucket::new("200-500", 200.0, 500.0),
    Bucket::new("500-1000", 500.0, 1000.0),
    Bucket::new("1000-10000", 1000.0, 10000.0),
    Bucket::new("10000-500000", 10000.0, 500000.0),
];

/// Count each value into the first bucket containing it. Values no bucket contains are dropped.
pub fn bucket_counts<I>(values: I, buckets: &[Bucket]) -> Vec<u64>
where
    I: IntoIterator<Item = f64>,
{
    let mut counts = vec![0u64; buckets.len()];
    for value in values {
        if let Some(i) = buckets.iter().position(|b| b.contains(value)) {
            counts[i] += 1;
        }
    }
    counts
}

/// Average same-day samples, round to 4 digits, newest day first.
pub fn bucket_daily_average<I>(samples: I) -> Vec<(NaiveDate, f64)>
where
    I: IntoIterator<Item = (NaiveDate, f64)>,
{
    let mut days: BTreeMap<NaiveDate, (f64, u32)> = BTreeMap::new();
    for (date, value) in samples {
        let entry = days.entry(date).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    days.into_iter()
        .rev()
        .map(|(date, (sum, n))| (date, round4(sum / n as f64)))
        .collect()
}

fn millis_to_date(millis: f64) -> Option<NaiveDate> {
    DateTime::from_timestamp_millis(millis as i64).map(|t| t.date_naive())
}

/// Sample the supply contract once per day over the window, plus the latest block.
///
/// The window starts at `start_block` when given, otherwise `days` worth of
/// blocks before the latest one. Samples past the latest block are clamped to it.
pub async fn historical_total_supply(
    chain: &dyn ChainSource,
    days: u64,
    start_block: Option<u64>,
) -> Result<DailyValues> {
    let header = chain.latest_block().await.context("latest block")?;
    let clock = BlockClock::from_header(header, chain.seconds_per_block());
    let per_day = clock.blocks_per_day();
    let start = start_block.unwrap_or_else(|| header.number.saturating_sub(days * per_day));

    let blocks: Vec<u64> = (0..days)
        .map(|day| start.saturating_add(day * per_day).min(header.number))
        .collect();
    debug!("Sampling total supply at {} blocks from {}", blocks.len(), start);

    let values = try_join_all(blocks.iter().map(|block| chain.read_total_supply_at(*block))).await?;
    let today = chain.read_current_total_supply().await?;

    let samples = blocks
        .iter()
        .map(|block| clock.date_of(*block))
        .zip(values)
        .chain(std::iter::once((clock.anchor_date(), today)));
    Ok(DailyValues(bucket_daily_average(samples)))
}

/// Exactly [`CIRC_SUPPLY_DAYS`] daily rows, newest first.
///
/// Same-day ledger rows are averaged. When the ledger is short, earlier days
/// repeat the oldest known supply with nothing claimed.
pub fn historical_circulating_supply(rows: Vec<CirculatingSupplyRow>, today: NaiveDate) -> Vec<CirculatingSupplyRow> {
    let mut by_date: BTreeMap<NaiveDate, (f64, f64, u32)> = BTreeMap::new();
    for row in rows {
        let entry = by_date.entry(row.date).or_insert((0.0, 0.0, 0));
        entry.0 += row.circulating_supply;
        entry.1 += row.total_claimed_that_day;
        entry.2 += 1;
    }

    let mut series: Vec<CirculatingSupplyRow> = by_date
        .into_iter()
        .rev()
        .take(CIRC_SUPPLY_DAYS)
        .map(|(date, (circ, claimed, n))| CirculatingSupplyRow {
            date,
            circulating_supply: round4(circ / n as f64),
            total_claimed_that_day: round4(claimed / n as f64),
        })
        .collect();

    let (mut date, supply) = match series.last() {
        Some(last) => (last.date - Duration::days(1), last.circulating_supply),
        None => (today, 0.0),
    };
    while series.len() < CIRC_SUPPLY_DAYS {
        series.push(CirculatingSupplyRow {
            date,
            circulating_supply: supply,
            total_claimed_that_day: 0.0,
        });
        date -= Duration::days(1);
    }
    series
}

/// Daily-averaged price and volume series.
pub fn prices_and_volume(history: &PriceHistory) -> PricesAndVolume {
    let by_day = |points: &[(f64, f64)]| {
        bucket_daily_average(
            points
                .iter()
                .filter_map(|(millis, value)| Some((millis_to_date(*millis)?, *value))),
        )
    };
    PricesAndVolume {
        prices: by_day(&history.prices),
        total_volumes: by_day(&history.total_volumes),
    }
}

/// Sum of every claim since the epoch block.
pub async fn current_circulating_supply(chain: &dyn ChainSource) -> Result<f64> {
    let latest = chain.latest_block().await?.number;
    let claims = chain.read_claim_events(chain.epoch_block(), latest).await?;
    Ok(round4(claims.iter().map(|c| c.amount).sum()))
}

/// Supply times spot price. A zero spot price gives zero market caps.
pub async fn market_cap(chain: &dyn ChainSource, market: &dyn MarketSource) -> Result<MarketCap> {
    let (total_supply, circulating_supply, price) = futures::try_join!(
        async { chain.read_current_total_supply().await.context("current total supply") },
        current_circulating_supply(chain),
        async { market.read_spot_price().await.context("spot price") },
    )?;
    info!(
        "Market cap inputs: total {} circulating {} price {}",
        total_supply, circulating_supply, price
    );
    Ok(MarketCap {
        total_supply_market_cap: round4(total_supply * price),
        circulating_supply_market_cap: round4(circulating_supply * price),
    })
}

/// Count non-dust, non-zero-address holders into [`HOLDER_RANGES`].
pub fn holder_distribution(balances: &[HolderBalance]) -> HolderDistribution {
    let amounts = balances
        .iter()
        .filter(|h| !h.address.eq_ignore_ascii_case(ZERO_ADDRESS) && h.amount > DUST_THRESHOLD)
        .map(|h| h.amount);
    let counts = bucket_counts(amounts, &HOLDER_RANGES);
    HolderDistribution {
        range_counts: RangeCounts(
            HOLDER_RANGES
                .iter()
                .zip(counts)
                .map(|(bucket, count)| (bucket.label.to_string(), count))
                .collect(),
        ),
    }
}

/// Wrap the cumulative series with their latest totals.
pub fn locked_and_burned(series: LockedBurnedSeries) -> LockedAndBurned {
    let last = |s: &BTreeMap<NaiveDate, f64>| s.values().next_back().copied().unwrap_or(0.0);
    LockedAndBurned {
        burnt_mor: BurntMor {
            total_burnt_till_now: last(&series.burnt),
            cumulative_mor_burnt: series.burnt,
        },
        locked_mor: LockedMor {
            total_locked_till_now: last(&series.locked),
            cumulative_mor_locked: series.locked,
        },
    }
}

/// Join circulating rows with total supply on date, newest first.
///
/// Days missing from the total-supply samples are left out.
pub fn combine_supply(group: &SupplyGroup) -> SupplyResponse {
    let mut data: Vec<SupplyDataPoint> = group
        .circ_supply
        .iter()
        .filter_map(|row| {
            Some(SupplyDataPoint {
                date: row.date,
                total_supply: group.total_supply.get(&row.date)?,
                circulating_supply: row.circulating_supply,
                total_claimed_that_day: row.total_claimed_that_day,
            })
        })
        .collect();
    data.sort_by(|a, b| b.date.cmp(&a.date));
    SupplyResponse { data }
}
