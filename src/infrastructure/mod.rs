pub mod abi;
pub mod chain_reader;
pub mod dune_client;
pub mod json_file_cache;
pub mod liquidity;
pub mod locked_burned;
pub mod market_client;
pub mod memory_cache;
pub mod rpc_client;
pub mod staking_ledger;
pub mod supply_ledger;

pub use chain_reader::EthChainReader;
pub use dune_client::DuneClient;
pub use json_file_cache::JsonFileCache;
pub use liquidity::UniswapLiquidityReader;
pub use locked_burned::TransferLogReader;
pub use market_client::MarketClient;
pub use memory_cache::MemoryCache;
pub use rpc_client::RpcClient;
pub use staking_ledger::CsvStakingLedger;
pub use supply_ledger::CsvSupplyLedger;
