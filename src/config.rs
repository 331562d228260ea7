//! Application configuration loaded from `config.yaml` plus environment overrides.
//!
//! Every section carries serde defaults, so a partial file (or an empty one)
//! still yields a runnable configuration. Secrets only come from the environment:
//! - `ETH_RPC_URL` / `ARB_RPC_URL`: node endpoints
//! - `DUNE_API_KEY`: analytics service key
//! - `CACHE_PATH`, `PORT`: deployment overrides

use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level application configuration.
#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Chain hosting the supply and distribution contracts
    #[serde(default = "default_mainnet")]
    pub mainnet: ChainConfig,
    /// Chain hosting the MOR token and its liquidity
    #[serde(default = "default_arbitrum")]
    pub arbitrum: ChainConfig,
    #[serde(default)]
    pub supply: SupplyConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub holders: HoldersConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub liquidity: LiquidityConfig,
    #[serde(default)]
    pub staking: StakingConfig,
}

/// Server configuration settings.
#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Comma-separated list of allowed CORS origins (default: "*")
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_allowed_origins() -> String {
    "*".to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: default_cache_path() }
    }
}

fn default_cache_path() -> String {
    "cache.json".to_string()
}

#[derive(Deserialize, Debug, Clone)]
pub struct SchedulerConfig {
    /// Full cache refresh period (default: 24h)
    #[serde(default = "default_cache_refresh_secs")]
    pub cache_refresh_interval_secs: u64,
    /// Staking groups refresh period (default: 23h)
    #[serde(default = "default_staking_refresh_secs")]
    pub staking_refresh_interval_secs: u64,
    /// Fire the first run immediately at startup
    #[serde(default = "default_true")]
    pub run_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cache_refresh_interval_secs: default_cache_refresh_secs(),
            staking_refresh_interval_secs: default_staking_refresh_secs(),
            run_on_startup: true,
        }
    }
}

fn default_cache_refresh_secs() -> u64 {
    60 * 60 * 24
}
fn default_staking_refresh_secs() -> u64 {
    60 * 60 * 23
}
fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug, Clone)]
pub struct ChainConfig {
    #[serde(default)]
    pub rpc_url: String,
    pub average_block_time_secs: f64,
    /// Widest block window per `eth_getLogs` call
    #[serde(default = "default_log_chunk_size")]
    pub log_chunk_size: u64,
}

fn default_log_chunk_size() -> u64 {
    50_000
}

fn default_mainnet() -> ChainConfig {
    ChainConfig {
        rpc_url: String::new(),
        average_block_time_secs: 12.0,
        log_chunk_size: default_log_chunk_size(),
    }
}

fn default_arbitrum() -> ChainConfig {
    ChainConfig {
        rpc_url: String::new(),
        average_block_time_secs: 0.25,
        log_chunk_size: 2_000_000,
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SupplyConfig {
    pub supply_contract: String,
    pub distribution_contract: String,
    #[serde(default = "default_claim_event")]
    pub claim_event_signature: String,
    /// First block of the claim history (1 Jan 2024 on mainnet)
    pub epoch_block: u64,
    #[serde(default = "default_historical_days")]
    pub historical_days: u64,
    /// Fixed first sampling block; derived from `historical_days` when absent
    #[serde(default)]
    pub historical_start_block: Option<u64>,
    pub circulating_supply_csv: String,
}

impl Default for SupplyConfig {
    fn default() -> Self {
        Self {
            supply_contract: String::new(),
            distribution_contract: "0x47176B2Af9885dC6C4575d4eFd63895f7Aaa4790".to_string(),
            claim_event_signature: default_claim_event(),
            epoch_block: 18_908_895,
            historical_days: default_historical_days(),
            historical_start_block: None,
            circulating_supply_csv: "data/circ_supply.csv".to_string(),
        }
    }
}

fn default_claim_event() -> String {
    "UserClaimed(uint256,address,address,uint256)".to_string()
}
fn default_historical_days() -> u64 {
    30
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub spot_price_url: String,
    pub price_history_url: String,
    pub counter_asset_price_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            spot_price_url:
                "https://api.dexscreener.com/latest/dex/tokens/0x092bAaDB7DEf4C3981454dD9c0A0D7FF07bCFc86"
                    .to_string(),
            price_history_url:
                "https://api.coingecko.com/api/v3/coins/morpheusai/market_chart?vs_currency=usd&days=30"
                    .to_string(),
            counter_asset_price_url:
                "https://api.coingecko.com/api/v3/simple/price?ids=wrapped-steth&vs_currencies=usd"
                    .to_string(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct HoldersConfig {
    #[serde(default = "default_dune_url")]
    pub base_url: String,
    pub query_id: u64,
    /// The holder query can be slow; long default timeout
    #[serde(default = "default_holders_timeout")]
    pub request_timeout_secs: u64,
    /// Filled from `DUNE_API_KEY`
    #[serde(skip)]
    pub api_key: String,
}

impl Default for HoldersConfig {
    fn default() -> Self {
        Self {
            base_url: default_dune_url(),
            query_id: 0,
            request_timeout_secs: default_holders_timeout(),
            api_key: String::new(),
        }
    }
}

fn default_dune_url() -> String {
    "https://api.dune.com".to_string()
}
fn default_holders_timeout() -> u64 {
    300
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TokenConfig {
    pub mor_token: String,
    pub deploy_block: u64,
    #[serde(default = "default_burn_addresses")]
    pub burn_addresses: Vec<String>,
    #[serde(default)]
    pub lock_addresses: Vec<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            mor_token: "0x092bAaDB7DEf4C3981454dD9c0A0D7FF07bCFc86".to_string(),
            deploy_block: 198_000_000,
            burn_addresses: default_burn_addresses(),
            lock_addresses: Vec::new(),
        }
    }
}

fn default_burn_addresses() -> Vec<String> {
    vec![
        "0x0000000000000000000000000000000000000000".to_string(),
        "0x000000000000000000000000000000000000dEaD".to_string(),
    ]
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LiquidityConfig {
    pub owner: String,
    pub position_manager: String,
    pub factory: String,
    #[serde(default = "default_decimals")]
    pub counter_asset_decimals: u32,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            owner: "0x151c2b49CdEC10B150B2763dF3d1C00D70C90956".to_string(),
            position_manager: "0xC36442b4a4522E871399CD717aBDD847Ab11FE88".to_string(),
            factory: "0x1F98431c8aD98523631AE4a59f267346ea31F984".to_string(),
            counter_asset_decimals: default_decimals(),
        }
    }
}

fn default_decimals() -> u32 {
    18
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct StakingConfig {
    pub events_csv: String,
    pub emissions_csv: String,
    /// Pool id -> emission schedule column feeding it
    #[serde(default = "default_pool_columns")]
    pub pool_emission_columns: BTreeMap<u32, String>,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            events_csv: "data/usermultiplier.csv".to_string(),
            emissions_csv: "data/emissions.csv".to_string(),
            pool_emission_columns: default_pool_columns(),
        }
    }
}

fn default_pool_columns() -> BTreeMap<u32, String> {
    BTreeMap::from([
        (0, "Capital Emission".to_string()),
        (1, "Code Emission".to_string()),
    ])
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            cache: CacheConfig::default(),
            scheduler: SchedulerConfig::default(),
            mainnet: default_mainnet(),
            arbitrum: default_arbitrum(),
            supply: SupplyConfig::default(),
            market: MarketConfig::default(),
            holders: HoldersConfig::default(),
            token: TokenConfig::default(),
            liquidity: LiquidityConfig::default(),
            staking: StakingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a YAML document without touching the environment.
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .context("Failed to parse config - check YAML syntax and structure")
    }

    /// Load from `path` and apply environment overrides.
    ///
    /// A missing file falls back to built-in defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::from_yaml(&content)?
        } else {
            tracing::warn!("{} not found, using built-in defaults", path.display());
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Settings left empty that some metrics need, as startup warnings.
    pub fn unset_settings(&self) -> Vec<&'static str> {
        let mut unset = Vec::new();
        if self.mainnet.rpc_url.trim().is_empty() || self.arbitrum.rpc_url.trim().is_empty() {
            unset.push("ETH_RPC_URL or ARB_RPC_URL not set - chain-backed metrics will fail until configured");
        }
        if self.holders.api_key.trim().is_empty() {
            unset.push("DUNE_API_KEY not set - /mor_holders_by_range will fail");
        }
        if self.supply.supply_contract.trim().is_empty() {
            unset.push("supply.supply_contract not set - total-supply metrics will fail until configured");
        }
        unset
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ETH_RPC_URL") {
            self.mainnet.rpc_url = url;
        }
        if let Ok(url) = std::env::var("ARB_RPC_URL") {
            self.arbitrum.rpc_url = url;
        }
        if let Ok(key) = std::env::var("DUNE_API_KEY") {
            self.holders.api_key = key;
        }
        if let Ok(path) = std::env::var("CACHE_PATH") {
            self.cache.path = path;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            self.server.port = port;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cache.path, "cache.json");
        assert_eq!(config.mainnet.average_block_time_secs, 12.0);
        assert_eq!(config.supply.historical_days, 30);
        assert_eq!(config.scheduler.cache_refresh_interval_secs, 86_400);
        assert_eq!(config.staking.pool_emission_columns[&1], "Code Emission");
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let yaml = r#"
server:
  port: 9100
scheduler:
  run_on_startup: false
mainnet:
  average_block_time_secs: 12.5
  log_chunk_size: 10000
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.scheduler.run_on_startup);
        assert_eq!(config.mainnet.log_chunk_size, 10_000);
        assert_eq!(config.arbitrum.average_block_time_secs, 0.25);
        assert_eq!(config.holders.request_timeout_secs, 300);
    }

    #[test]
    fn unset_settings_are_reported() {
        let config = AppConfig::default();
        let unset = config.unset_settings();
        assert_eq!(unset.len(), 3);
        assert!(unset.iter().any(|w| w.starts_with("supply.supply_contract")));

        let yaml = r#"
mainnet:
  rpc_url: "http://localhost:8545"
  average_block_time_secs: 12.0
arbitrum:
  rpc_url: "http://localhost:8547"
  average_block_time_secs: 0.25
supply:
  supply_contract: "0x47176B2Af9885dC6C4575d4eFd63895f7Aaa4790"
"#;
        let mut config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.unset_settings().len(), 1);
        config.holders.api_key = "key".to_string();
        assert!(config.unset_settings().is_empty());
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(AppConfig::from_yaml("server: [not, a, map").is_err());
    }
}
