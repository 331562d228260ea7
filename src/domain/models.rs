//! Metric documents and adapter payloads.
//!
//! Everything that lands in the cache file is `Serialize + Deserialize` so a
//! cached group can be decoded back into its typed form. Dates serialize as
//! ISO-8601 (`YYYY-MM-DD`).

use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Cache keys, one per metric group.
pub mod groups {
    pub const STAKING_METRICS: &str = "staking_metrics";
    pub const GIVE_MOR_REWARD: &str = "give_mor_reward";
    pub const STAKE_INFO: &str = "stake_info";
    pub const TOTAL_AND_CIRC_SUPPLY: &str = "total_and_circ_supply";
    pub const PRICES_AND_VOLUME: &str = "prices_and_volume";
    pub const MARKET_CAP: &str = "market_cap";
    pub const MOR_HOLDERS_BY_RANGE: &str = "mor_holders_by_range";
    pub const LOCKED_AND_BURNT_MOR: &str = "locked_and_burnt_mor";
    pub const PROTOCOL_LIQUIDITY: &str = "protocol_liquidity";
}

// ============================================================================
// Adapter payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    /// Unix seconds
    pub timestamp: i64,
}

/// One `UserClaimed` log from the distribution contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimEvent {
    pub block_number: u64,
    /// Claimed amount in whole tokens (already divided by 10^18)
    pub amount: f64,
}

/// Raw price-history response, (timestamp-millis, value) pairs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriceHistory {
    #[serde(default)]
    pub prices: Vec<(f64, f64)>,
    #[serde(default)]
    pub total_volumes: Vec<(f64, f64)>,
}

/// A row of the holder-balance analytics query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderBalance {
    pub address: String,
    #[serde(default)]
    pub amount: f64,
}

/// A staking event row from the staking CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeEvent {
    /// Unix seconds
    pub timestamp: i64,
    pub user: String,
    pub pool_id: u32,
    pub amount: f64,
    pub claim_lock_start: i64,
    pub claim_lock_end: i64,
    pub multiplier: f64,
    pub current_user_reward: f64,
    pub daily_reward: f64,
}

/// One day of the emission schedule: category column -> tokens emitted that day.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionDay {
    pub date: NaiveDate,
    pub emissions: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LockedBurnedSeries {
    pub burnt: BTreeMap<NaiveDate, f64>,
    pub locked: BTreeMap<NaiveDate, f64>,
}

// ============================================================================
// Supply & market documents
// ============================================================================

/// Date-keyed values, most recent date first, at most one entry per date.
///
/// Serialized as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyValues(pub Vec<(NaiveDate, f64)>);

impl DailyValues {
    pub fn get(&self, date: &NaiveDate) -> Option<f64> {
        self.0.iter().find(|(d, _)| d == date).map(|(_, v)| *v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for DailyValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (date, value) in &self.0 {
            map.serialize_entry(date, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DailyValues {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let by_date = BTreeMap::<NaiveDate, f64>::deserialize(deserializer)?;
        Ok(DailyValues(by_date.into_iter().rev().collect()))
    }
}

/// A day of the circulating-supply ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CirculatingSupplyRow {
    pub date: NaiveDate,
    pub circulating_supply: f64,
    pub total_claimed_that_day: f64,
}

/// Cached `total_and_circ_supply` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyGroup {
    pub total_supply: DailyValues,
    pub circ_supply: Vec<CirculatingSupplyRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyDataPoint {
    pub date: NaiveDate,
    pub total_supply: f64,
    pub circulating_supply: f64,
    pub total_claimed_that_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyResponse {
    pub data: Vec<SupplyDataPoint>,
}

/// Cached `prices_and_volume` group, `[date, value]` pairs newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricesAndVolume {
    pub prices: Vec<(NaiveDate, f64)>,
    pub total_volumes: Vec<(NaiveDate, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCap {
    pub total_supply_market_cap: f64,
    pub circulating_supply_market_cap: f64,
}

/// Range label -> count, kept in range-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeCounts(pub Vec<(String, u64)>);

impl RangeCounts {
    pub fn get(&self, label: &str) -> Option<u64> {
        self.0.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
    }

    pub fn total(&self) -> u64 {
        self.0.iter().map(|(_, c)| c).sum()
    }
}

impl Serialize for RangeCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in &self.0 {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RangeCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = RangeCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of range label to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut counts = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, count)) = access.next_entry::<String, u64>()? {
                    counts.push((label, count));
                }
                Ok(RangeCounts(counts))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Cached `mor_holders_by_range` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderDistribution {
    pub range_counts: RangeCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurntMor {
    pub cumulative_mor_burnt: BTreeMap<NaiveDate, f64>,
    pub total_burnt_till_now: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedMor {
    pub cumulative_mor_locked: BTreeMap<NaiveDate, f64>,
    pub total_locked_till_now: f64,
}

/// Cached `locked_and_burnt_mor` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedAndBurned {
    pub burnt_mor: BurntMor,
    pub locked_mor: LockedMor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPosition {
    pub token_id: u64,
    pub mor: f64,
    pub steth: f64,
}

/// Cached `protocol_liquidity` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolLiquidity {
    pub owner: String,
    pub positions: Vec<LiquidityPosition>,
    pub mor: f64,
    pub steth: f64,
    pub mor_price_usd: f64,
    pub steth_price_usd: f64,
    pub usd: f64,
}

// ============================================================================
// Staking documents
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakerAnalysis {
    /// date -> {"pool_<id>": n, "combined": n}
    pub daily_unique_stakers: BTreeMap<NaiveDate, BTreeMap<String, u64>>,
    pub total_unique_stakers: BTreeMap<String, u64>,
    /// pool id -> `N days, H:MM:SS`
    pub average_stake_time: BTreeMap<String, String>,
    pub combined_average_stake_time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiplierAnalysis {
    pub overall_average: f64,
    pub capital_average: f64,
    pub code_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRewardSummary {
    pub stakers: u64,
    pub total_staked: f64,
    pub daily_reward_sum: f64,
    pub total_current_user_reward_sum: f64,
}

/// Emission schedule lookup for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionSnapshot {
    pub date: Option<NaiveDate>,
    pub new_emissions: BTreeMap<String, f64>,
    pub total_emissions: BTreeMap<String, f64>,
}

/// Cached `staking_metrics` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingMetrics {
    pub staker_analysis: StakerAnalysis,
    pub multiplier_analysis: MultiplierAnalysis,
    pub stakereward_analysis: BTreeMap<String, PoolRewardSummary>,
    pub emissionreward_analysis: EmissionSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub ranges: Vec<String>,
    pub frequencies: Vec<u64>,
}

/// Cached `stake_info` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeInfo {
    pub stake_time: Histogram,
    pub power_multiplier: Histogram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolRewardRate {
    pub emission_column: String,
    pub daily_emission: f64,
    pub total_staked: f64,
    pub daily_reward_per_token: f64,
}

/// Cached `give_mor_reward` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardRates {
    pub date: NaiveDate,
    pub pools: BTreeMap<String, PoolRewardRate>,
}
