//! Protocol-owned liquidity held as concentrated-liquidity position NFTs.
//!
//! Walks the owner's positions on the position manager, resolves each
//! position's pool through the factory, and converts liquidity into token
//! amounts at the pool's current price.

use crate::config::LiquidityConfig;
use crate::domain::{
    AdapterError, AdapterResult, LiquidityPosition, LiquiditySource, MarketSource, ProtocolLiquidity,
};
use crate::infrastructure::abi::{
    self, balanceOfCall, getPoolCall, positionsCall, positionsReturn, slot0Call, tokenOfOwnerByIndexCall,
};
use crate::infrastructure::rpc_client::{BlockTag, RpcClient};
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

const MOR_DECIMALS: i32 = 18;
/// 2^96, the fixed-point scale of `sqrtPriceX96`.
const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// Ticks of a position as plain integers.
fn tick_range(position: &positionsReturn) -> AdapterResult<(i64, i64)> {
    let lower = i64::try_from(position.tickLower)
        .map_err(|_| AdapterError::decode("tickLower out of range"))?;
    let upper = i64::try_from(position.tickUpper)
        .map_err(|_| AdapterError::decode("tickUpper out of range"))?;
    Ok((lower, upper))
}

/// Raw `(amount0, amount1)` held by `liquidity` in `[tick_lower, tick_upper)` at the given price.
pub fn position_amounts(liquidity: f64, sqrt_price_x96: f64, tick_lower: i64, tick_upper: i64) -> (f64, f64) {
    let sqrt_price = sqrt_price_x96 / Q96;
    let sqrt_lower = 1.0001f64.powf(tick_lower as f64 / 2.0);
    let sqrt_upper = 1.0001f64.powf(tick_upper as f64 / 2.0);

    if sqrt_price <= sqrt_lower {
        (liquidity * (sqrt_upper - sqrt_lower) / (sqrt_lower * sqrt_upper), 0.0)
    } else if sqrt_price < sqrt_upper {
        (
            liquidity * (sqrt_upper - sqrt_price) / (sqrt_price * sqrt_upper),
            liquidity * (sqrt_price - sqrt_lower),
        )
    } else {
        (0.0, liquidity * (sqrt_upper - sqrt_lower))
    }
}

pub struct UniswapLiquidityReader {
    rpc: Arc<RpcClient>,
    market: Arc<dyn MarketSource>,
    owner: Address,
    position_manager: Address,
    factory: Address,
    mor_token: Address,
    counter_asset_decimals: i32,
}

impl UniswapLiquidityReader {
    pub fn new(
        rpc: Arc<RpcClient>,
        market: Arc<dyn MarketSource>,
        config: &LiquidityConfig,
        mor_token: &str,
    ) -> AdapterResult<Self> {
        Ok(Self {
            rpc,
            market,
            owner: abi::parse_address(&config.owner)?,
            position_manager: abi::parse_address(&config.position_manager)?,
            factory: abi::parse_address(&config.factory)?,
            mor_token: abi::parse_address(mor_token)?,
            counter_asset_decimals: config.counter_asset_decimals as i32,
        })
    }

    async fn call<C: SolCall>(&self, to: Address, call: C) -> AdapterResult<C::Return> {
        let ret = self.rpc.call(to, &call.abi_encode(), BlockTag::Latest).await?;
        Ok(C::abi_decode_returns(&ret, true)?)
    }

    async fn position_ids(&self) -> AdapterResult<Vec<u64>> {
        let count = self
            .call(self.position_manager, balanceOfCall { owner: self.owner })
            .await?
            .balance;
        debug!("{} owns {} positions", self.owner, count);

        let lookups = (0..abi::to_u64(count)?).map(|index| async move {
            let call = tokenOfOwnerByIndexCall {
                owner: self.owner,
                index: U256::from(index),
            };
            abi::to_u64(self.call(self.position_manager, call).await?.tokenId)
        });
        try_join_all(lookups).await
    }

    async fn read_position(&self, token_id: u64) -> AdapterResult<LiquidityPosition> {
        let position = self
            .call(
                self.position_manager,
                positionsCall {
                    tokenId: U256::from(token_id),
                },
            )
            .await?;
        let (tick_lower, tick_upper) = tick_range(&position)?;

        let pool = self
            .call(
                self.factory,
                getPoolCall {
                    tokenA: position.token0,
                    tokenB: position.token1,
                    fee: position.fee,
                },
            )
            .await?
            .pool;
        let sqrt_price_x96 = abi::uint_to_f64(self.call(pool, slot0Call {}).await?.sqrtPriceX96);

        let (raw0, raw1) = position_amounts(position.liquidity as f64, sqrt_price_x96, tick_lower, tick_upper);
        let (raw_mor, raw_counter) = if position.token0 == self.mor_token {
            (raw0, raw1)
        } else {
            (raw1, raw0)
        };

        Ok(LiquidityPosition {
            token_id,
            mor: abi::round4(raw_mor / 10f64.powi(MOR_DECIMALS)),
            steth: abi::round4(raw_counter / 10f64.powi(self.counter_asset_decimals)),
        })
    }
}

#[async_trait]
impl LiquiditySource for UniswapLiquidityReader {
    async fn read_protocol_liquidity(&self) -> AdapterResult<ProtocolLiquidity> {
        let ids = self.position_ids().await?;
        if ids.is_empty() {
            return Err(AdapterError::decode(format!(
                "no liquidity positions found for {}",
                self.owner
            )));
        }

        let positions = try_join_all(ids.into_iter().map(|id| self.read_position(id))).await?;
        let mor_price_usd = self.market.read_spot_price().await?;
        let steth_price_usd = self.market.read_counter_asset_price().await?;

        let liquidity = summarize(self.owner.to_string(), positions, mor_price_usd, steth_price_usd);
        info!(
            "Protocol liquidity: {} positions, {:.2} USD",
            liquidity.positions.len(),
            liquidity.usd
        );
        Ok(liquidity)
    }
}

fn summarize(
    owner: String,
    positions: Vec<LiquidityPosition>,
    mor_price_usd: f64,
    steth_price_usd: f64,
) -> ProtocolLiquidity {
    let mor: f64 = positions.iter().map(|p| p.mor).sum();
    let steth: f64 = positions.iter().map(|p| p.steth).sum();
    ProtocolLiquidity {
        owner,
        positions,
        mor: abi::round4(mor),
        steth: abi::round4(steth),
        mor_price_usd,
        steth_price_usd,
        usd: abi::round4(mor * mor_price_usd + steth * steth_price_usd),
    }
}
