//! Domain layer - metric documents, adapter traits and the block clock.
//!
//! The application layer only talks to the outside world through the traits
//! defined here, so every aggregator can be exercised against fakes:
//! - Adapter traits for the node, price APIs, the analytics service and CSV ledgers
//! - The `CacheStore` seam replacing the global cache file
//! - Document types that end up in the cache and on the wire

pub mod block_clock;
pub mod models;

pub use block_clock::BlockClock;
pub use models::*;

use async_trait::async_trait;
use thiserror::Error;

/// The whole cache: metric-group name -> group document.
pub type CacheDocument = serde_json::Map<String, serde_json::Value>;

/// Failure raised by an external data adapter.
///
/// Adapters never retry; the error is handed to the caller as-is.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The node answered with a JSON-RPC error (e.g. pruned historical state).
    #[error("node rejected {method}: {message}")]
    Rpc { method: String, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered, but not with a success status.
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    #[error("unexpected response: {0}")]
    Decode(String),

    /// Contract return data did not match the call's ABI.
    #[error("ABI decode failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl AdapterError {
    pub fn decode(msg: impl Into<String>) -> Self {
        AdapterError::Decode(msg.into())
    }
}

pub type AdapterResult<T> = Result<T, AdapterError>;

/// Read access to the chain hosting the supply and distribution contracts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Number and timestamp of the latest block.
    async fn latest_block(&self) -> AdapterResult<BlockHeader>;

    /// Reward-accumulation total at a historical block, scaled down by 10^18, 4 fraction digits.
    ///
    /// # Errors
    ///
    /// Fails when the node cannot serve the historical state (e.g. pruned).
    async fn read_total_supply_at(&self, block: u64) -> AdapterResult<f64>;

    /// Same call against the latest block.
    async fn read_current_total_supply(&self) -> AdapterResult<f64>;

    /// Claim events emitted by the distribution contract in `[from_block, to_block]`.
    async fn read_claim_events(&self, from_block: u64, to_block: u64)
        -> AdapterResult<Vec<ClaimEvent>>;

    /// Block every "since epoch" summation starts from.
    fn epoch_block(&self) -> u64;

    /// Average seconds between blocks on this chain.
    fn seconds_per_block(&self) -> f64;
}

/// DEX quote and price-history APIs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Current quoted MOR price in USD.
    ///
    /// A non-success HTTP status yields `Ok(0.0)`; callers must tolerate a zero price.
    async fn read_spot_price(&self) -> AdapterResult<f64>;

    /// Raw multi-day price and volume series as (timestamp-millis, value) pairs.
    async fn read_price_history(&self) -> AdapterResult<PriceHistory>;

    /// USD price of the liquidity counter-asset.
    async fn read_counter_asset_price(&self) -> AdapterResult<f64>;
}

/// SQL-analytics service holding the token-holder query.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HolderSource: Send + Sync {
    async fn read_holder_balances(&self) -> AdapterResult<Vec<HolderBalance>>;
}

/// Append-only circulating-supply ledger backed by a CSV file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SupplyLedger: Send + Sync {
    /// Bring the ledger up to date, then return every row it holds.
    async fn read_and_update_circulating_supply_csv(&self) -> AdapterResult<Vec<CirculatingSupplyRow>>;
}

/// Staking event history and the emission schedule.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StakingLedger: Send + Sync {
    async fn read_stake_events(&self) -> AdapterResult<Vec<StakeEvent>>;

    async fn read_emission_schedule(&self) -> AdapterResult<Vec<EmissionDay>>;
}

/// Cumulative daily locked and burned token amounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LockedBurnedSource: Send + Sync {
    async fn read_locked_and_burned_series(&self) -> AdapterResult<LockedBurnedSeries>;
}

/// Liquidity positions owned by the protocol.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiquiditySource: Send + Sync {
    async fn read_protocol_liquidity(&self) -> AdapterResult<ProtocolLiquidity>;
}

/// Whole-document metric cache.
///
/// Implementations must be thread-safe (`Send + Sync`). There is no per-key
/// update: callers read the full document, change it and write it back.
///
/// # Implementations
///
/// See `infrastructure::JsonFileCache` (disk) and `infrastructure::MemoryCache` (tests).
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load the whole document.
    ///
    /// Never fails: an absent, empty or corrupt store reads as an empty document.
    async fn read(&self) -> CacheDocument;

    /// Replace the whole document.
    async fn write(&self, document: &CacheDocument) -> anyhow::Result<()>;
}
