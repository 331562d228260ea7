//! Metric-group service: cached reads, compute-on-miss and whole-cache refreshes.
//!
//! Every group is looked up in the cache document first. A miss (or a cached
//! value that no longer decodes) computes the group from the adapters, merges
//! it into the document and writes the document back.

use crate::application::{aggregators, staking};
use crate::config::AppConfig;
use crate::domain::{
    groups, CacheStore, ChainSource, HolderDistribution, HolderSource, LiquiditySource, LockedAndBurned,
    LockedBurnedSource, MarketCap, MarketSource, PricesAndVolume, ProtocolLiquidity, RewardRates, StakeInfo,
    StakingLedger, StakingMetrics, SupplyGroup, SupplyLedger, SupplyResponse,
};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use futures::future::try_join_all;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Every cached group, in refresh order.
pub const ALL_GROUPS: [&str; 9] = [
    groups::STAKING_METRICS,
    groups::GIVE_MOR_REWARD,
    groups::STAKE_INFO,
    groups::TOTAL_AND_CIRC_SUPPLY,
    groups::PRICES_AND_VOLUME,
    groups::MARKET_CAP,
    groups::MOR_HOLDERS_BY_RANGE,
    groups::LOCKED_AND_BURNT_MOR,
    groups::PROTOCOL_LIQUIDITY,
];

/// Groups derived from the staking CSVs.
pub const STAKING_GROUPS: [&str; 3] = [groups::STAKING_METRICS, groups::GIVE_MOR_REWARD, groups::STAKE_INFO];

/// External collaborators the service computes from.
#[derive(Clone)]
pub struct Adapters {
    pub chain: Arc<dyn ChainSource>,
    pub market: Arc<dyn MarketSource>,
    pub holders: Arc<dyn HolderSource>,
    pub supply_ledger: Arc<dyn SupplyLedger>,
    pub staking: Arc<dyn StakingLedger>,
    pub locked_burned: Arc<dyn LockedBurnedSource>,
    pub liquidity: Arc<dyn LiquiditySource>,
}

#[derive(Debug, Clone)]
pub struct MetricsSettings {
    pub historical_days: u64,
    pub historical_start_block: Option<u64>,
    pub pool_emission_columns: BTreeMap<u32, String>,
}

impl MetricsSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            historical_days: config.supply.historical_days,
            historical_start_block: config.supply.historical_start_block,
            pool_emission_columns: config.staking.pool_emission_columns.clone(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct MetricsService {
    adapters: Adapters,
    cache: Arc<dyn CacheStore>,
    settings: MetricsSettings,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize metric group")
}

impl MetricsService {
    pub fn new(adapters: Adapters, cache: Arc<dyn CacheStore>, settings: MetricsSettings) -> Self {
        Self {
            adapters,
            cache,
            settings,
        }
    }

    /// Cached group if present and decodable, otherwise compute, cache and return it.
    ///
    /// A failed cache write is logged; the computed value is still returned.
    pub async fn get_or_compute<T, F, Fut>(&self, group: &'static str, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.cache.read().await.remove(group) {
            match serde_json::from_value::<T>(cached) {
                Ok(value) => {
                    debug!("Cache hit: {}", group);
                    metrics::counter!("cache_operations_total", "group" => group, "operation" => "hit")
                        .increment(1);
                    return Ok(value);
                }
                Err(e) => warn!("Cached {} no longer decodes, recomputing: {}", group, e),
            }
        }

        info!("Cache miss, computing: {}", group);
        metrics::counter!("cache_operations_total", "group" => group, "operation" => "miss").increment(1);

        let value = compute().await?;
        let json = to_json(&value)?;

        let mut document = self.cache.read().await;
        document.insert(group.to_string(), json);
        if let Err(e) = self.cache.write(&document).await {
            warn!("Failed to cache {}: {:#}", group, e);
            metrics::counter!("cache_operations_total", "group" => group, "operation" => "write_error")
                .increment(1);
        }
        Ok(value)
    }

    // ------------------------------------------------------------------------
    // Group computations
    // ------------------------------------------------------------------------

    async fn compute_staking_metrics(&self) -> Result<StakingMetrics> {
        let events = self.adapters.staking.read_stake_events().await.context("stake events")?;
        let schedule = self
            .adapters
            .staking
            .read_emission_schedule()
            .await
            .context("emission schedule")?;
        Ok(staking::staking_metrics(&events, &schedule, today()))
    }

    async fn compute_reward_rates(&self) -> Result<RewardRates> {
        let events = self.adapters.staking.read_stake_events().await.context("stake events")?;
        let schedule = self
            .adapters
            .staking
            .read_emission_schedule()
            .await
            .context("emission schedule")?;
        Ok(staking::reward_rates(
            &events,
            &schedule,
            &self.settings.pool_emission_columns,
            today(),
        ))
    }

    async fn compute_stake_info(&self) -> Result<StakeInfo> {
        let events = self.adapters.staking.read_stake_events().await.context("stake events")?;
        Ok(staking::stake_info(&events))
    }

    async fn compute_supply_group(&self) -> Result<SupplyGroup> {
        let total_supply = aggregators::historical_total_supply(
            self.adapters.chain.as_ref(),
            self.settings.historical_days,
            self.settings.historical_start_block,
        )
        .await?;
        let rows = self
            .adapters
            .supply_ledger
            .read_and_update_circulating_supply_csv()
            .await
            .context("circulating supply ledger")?;
        Ok(SupplyGroup {
            total_supply,
            circ_supply: aggregators::historical_circulating_supply(rows, today()),
        })
    }

    async fn compute_prices_and_volume(&self) -> Result<PricesAndVolume> {
        let history = self.adapters.market.read_price_history().await.context("price history")?;
        Ok(aggregators::prices_and_volume(&history))
    }

    async fn compute_market_cap(&self) -> Result<MarketCap> {
        aggregators::market_cap(self.adapters.chain.as_ref(), self.adapters.market.as_ref()).await
    }

    async fn compute_holder_distribution(&self) -> Result<HolderDistribution> {
        let balances = self.adapters.holders.read_holder_balances().await.context("holder balances")?;
        Ok(aggregators::holder_distribution(&balances))
    }

    async fn compute_locked_and_burned(&self) -> Result<LockedAndBurned> {
        let series = self
            .adapters
            .locked_burned
            .read_locked_and_burned_series()
            .await
            .context("locked and burned series")?;
        Ok(aggregators::locked_and_burned(series))
    }

    async fn compute_protocol_liquidity(&self) -> Result<ProtocolLiquidity> {
        Ok(self.adapters.liquidity.read_protocol_liquidity().await?)
    }

    async fn compute_group(&self, group: &str) -> Result<Value> {
        match group {
            groups::STAKING_METRICS => to_json(self.compute_staking_metrics().await?),
            groups::GIVE_MOR_REWARD => to_json(self.compute_reward_rates().await?),
            groups::STAKE_INFO => to_json(self.compute_stake_info().await?),
            groups::TOTAL_AND_CIRC_SUPPLY => to_json(self.compute_supply_group().await?),
            groups::PRICES_AND_VOLUME => to_json(self.compute_prices_and_volume().await?),
            groups::MARKET_CAP => to_json(self.compute_market_cap().await?),
            groups::MOR_HOLDERS_BY_RANGE => to_json(self.compute_holder_distribution().await?),
            groups::LOCKED_AND_BURNT_MOR => to_json(self.compute_locked_and_burned().await?),
            groups::PROTOCOL_LIQUIDITY => to_json(self.compute_protocol_liquidity().await?),
            other => anyhow::bail!("unknown metric group: {}", other),
        }
    }

    // ------------------------------------------------------------------------
    // Cached getters, one per endpoint
    // ------------------------------------------------------------------------

    pub async fn staking_metrics(&self) -> Result<StakingMetrics> {
        self.get_or_compute(groups::STAKING_METRICS, || self.compute_staking_metrics())
            .await
    }

    pub async fn give_mor_reward(&self) -> Result<RewardRates> {
        self.get_or_compute(groups::GIVE_MOR_REWARD, || self.compute_reward_rates())
            .await
    }

    pub async fn stake_info(&self) -> Result<StakeInfo> {
        self.get_or_compute(groups::STAKE_INFO, || self.compute_stake_info())
            .await
    }

    pub async fn total_and_circ_supply(&self) -> Result<SupplyResponse> {
        let group = self
            .get_or_compute(groups::TOTAL_AND_CIRC_SUPPLY, || self.compute_supply_group())
            .await?;
        Ok(aggregators::combine_supply(&group))
    }

    pub async fn prices_and_volume(&self) -> Result<PricesAndVolume> {
        self.get_or_compute(groups::PRICES_AND_VOLUME, || self.compute_prices_and_volume())
            .await
    }

    pub async fn market_cap(&self) -> Result<MarketCap> {
        self.get_or_compute(groups::MARKET_CAP, || self.compute_market_cap())
            .await
    }

    pub async fn holders_by_range(&self) -> Result<HolderDistribution> {
        self.get_or_compute(groups::MOR_HOLDERS_BY_RANGE, || self.compute_holder_distribution())
            .await
    }

    pub async fn locked_and_burnt_mor(&self) -> Result<LockedAndBurned> {
        self.get_or_compute(groups::LOCKED_AND_BURNT_MOR, || self.compute_locked_and_burned())
            .await
    }

    pub async fn protocol_liquidity(&self) -> Result<ProtocolLiquidity> {
        self.get_or_compute(groups::PROTOCOL_LIQUIDITY, || self.compute_protocol_liquidity())
            .await
    }

    // ------------------------------------------------------------------------
    // Refreshes
    // ------------------------------------------------------------------------

    /// Recompute `group_names` and write them in one document write.
    ///
    /// Any failing group aborts the refresh before anything is written.
    async fn refresh_groups(&self, group_names: &[&'static str]) -> Result<usize> {
        let values = try_join_all(group_names.iter().map(|group| async move {
            self.compute_group(group)
                .await
                .with_context(|| format!("refreshing {}", group))
        }))
        .await?;

        let mut document = self.cache.read().await;
        for (group, value) in group_names.iter().zip(values) {
            document.insert(group.to_string(), value);
        }
        self.cache.write(&document).await?;
        Ok(group_names.len())
    }

    /// Recompute every group and overwrite the cache.
    pub async fn refresh_all(&self) -> Result<usize> {
        self.refresh_groups(&ALL_GROUPS).await
    }

    /// Recompute the staking groups only.
    pub async fn refresh_staking(&self) -> Result<usize> {
        self.refresh_groups(&STAKING_GROUPS).await
    }

    /// Number of groups currently cached.
    pub async fn cached_group_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
