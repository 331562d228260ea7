//! Cumulative locked and burned MOR, rebuilt from `Transfer` logs.

use crate::config::{ChainConfig, TokenConfig};
use crate::domain::{AdapterError, AdapterResult, BlockClock, LockedBurnedSeries, LockedBurnedSource};
use crate::infrastructure::abi::{self, Transfer};
use crate::infrastructure::rpc_client::{RpcClient, RpcLog};
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub struct TransferLogReader {
    rpc: Arc<RpcClient>,
    token: Address,
    deploy_block: u64,
    seconds_per_block: f64,
    burn_topics: Vec<B256>,
    lock_topics: Vec<B256>,
}

impl TransferLogReader {
    pub fn new(rpc: Arc<RpcClient>, chain: &ChainConfig, token: &TokenConfig) -> AdapterResult<Self> {
        let topics = |addresses: &[String]| {
            addresses
                .iter()
                .map(|a| abi::address_topic(a))
                .collect::<AdapterResult<Vec<_>>>()
        };
        Ok(Self {
            rpc,
            token: abi::parse_address(&token.mor_token)?,
            deploy_block: token.deploy_block,
            seconds_per_block: chain.average_block_time_secs,
            burn_topics: topics(&token.burn_addresses)?,
            lock_topics: topics(&token.lock_addresses)?,
        })
    }

    /// Transfer logs whose `from` (position 1) or `to` (position 2) is one of `addresses`.
    async fn transfers(&self, position: usize, addresses: &[B256], to_block: u64) -> AdapterResult<Vec<RpcLog>> {
        if addresses.is_empty() {
            return Ok(Vec::new());
        }
        let mut topics: Vec<Value> = vec![json!(abi::to_hex(Transfer::SIGNATURE_HASH)), Value::Null, Value::Null];
        topics[position] = json!(addresses.iter().map(abi::to_hex).collect::<Vec<_>>());
        self.rpc.get_logs(self.token, topics, self.deploy_block, to_block).await
    }
}

/// Daily `(date, amount)` movements bucketed by the block clock.
fn daily_amounts(logs: &[RpcLog], clock: &BlockClock, sign: f64) -> AdapterResult<Vec<(NaiveDate, f64)>> {
    logs.iter()
        .map(|log| {
            let value = abi::data_words(&log.data)?
                .first()
                .copied()
                .ok_or_else(|| AdapterError::decode("transfer log without value"))?;
            let amount = abi::to_tokens(value);
            Ok((clock.date_of(log.block()?), sign * amount))
        })
        .collect()
}

/// Dense running total from the first movement's day through `today`.
pub fn cumulative_daily(movements: &[(NaiveDate, f64)], today: NaiveDate) -> BTreeMap<NaiveDate, f64> {
    let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, amount) in movements {
        *per_day.entry(*date).or_insert(0.0) += amount;
    }

    let mut series = BTreeMap::new();
    let Some(first) = per_day.keys().next().copied() else {
        return series;
    };
    let last = per_day.keys().next_back().copied().unwrap_or(first).max(today);

    let mut running = 0.0;
    let mut date = first;
    while date <= last {
        running += per_day.get(&date).copied().unwrap_or(0.0);
        series.insert(date, abi::round4(running));
        date += Duration::days(1);
    }
    series
}

#[async_trait]
impl LockedBurnedSource for TransferLogReader {
    async fn read_locked_and_burned_series(&self) -> AdapterResult<LockedBurnedSeries> {
        let header = self.rpc.latest_block().await?;
        let clock = BlockClock::from_header(header, self.seconds_per_block);
        let latest = header.number;

        let burns = self.transfers(2, &self.burn_topics, latest).await?;
        let lock_in = self.transfers(2, &self.lock_topics, latest).await?;
        let lock_out = self.transfers(1, &self.lock_topics, latest).await?;
        info!(
            "Transfer logs: {} burns, {} into locks, {} out of locks",
            burns.len(),
            lock_in.len(),
            lock_out.len()
        );

        let today = clock.anchor_date();
        let burnt = cumulative_daily(&daily_amounts(&burns, &clock, 1.0)?, today);

        let mut locked_moves = daily_amounts(&lock_in, &clock, 1.0)?;
        locked_moves.extend(daily_amounts(&lock_out, &clock, -1.0)?);
        let locked = cumulative_daily(&locked_moves, today);

        Ok(LockedBurnedSeries { burnt, locked })
    }
}
