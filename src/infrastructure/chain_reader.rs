//! Supply-contract and distribution-contract reader.

use crate::config::{ChainConfig, SupplyConfig};
use crate::domain::{AdapterError, AdapterResult, BlockHeader, ChainSource, ClaimEvent};
use crate::infrastructure::abi::{self, getTotalRewardsCall};
use crate::infrastructure::rpc_client::{BlockTag, RpcClient};
use alloy_primitives::{Address, B256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct EthChainReader {
    rpc: Arc<RpcClient>,
    /// Unset until configured for the deployment.
    supply_contract: Option<Address>,
    distribution_contract: Address,
    claim_topic: B256,
    epoch_block: u64,
    seconds_per_block: f64,
}

impl EthChainReader {
    pub fn new(rpc: Arc<RpcClient>, chain: &ChainConfig, supply: &SupplyConfig) -> AdapterResult<Self> {
        let supply_contract = match supply.supply_contract.trim() {
            "" => None,
            address => Some(abi::parse_address(address)?),
        };
        Ok(Self {
            rpc,
            supply_contract,
            distribution_contract: abi::parse_address(&supply.distribution_contract)?,
            claim_topic: abi::event_topic(&supply.claim_event_signature),
            epoch_block: supply.epoch_block,
            seconds_per_block: chain.average_block_time_secs,
        })
    }

    async fn total_rewards(&self, block: BlockTag) -> AdapterResult<f64> {
        let contract = self
            .supply_contract
            .ok_or_else(|| AdapterError::decode("supply contract address is not configured"))?;
        let ret = self
            .rpc
            .call(contract, &getTotalRewardsCall {}.abi_encode(), block)
            .await?;
        let total = getTotalRewardsCall::abi_decode_returns(&ret, true)?.total;
        Ok(abi::round4(abi::to_tokens(total)))
    }
}

/// The claimed amount is the last word of the event data.
fn claim_from_log(block_number: u64, data: &str) -> AdapterResult<ClaimEvent> {
    let amount = abi::data_words(data)?
        .pop()
        .ok_or_else(|| AdapterError::decode("claim event without data"))?;
    Ok(ClaimEvent {
        block_number,
        amount: abi::to_tokens(amount),
    })
}

#[async_trait]
impl ChainSource for EthChainReader {
    async fn latest_block(&self) -> AdapterResult<BlockHeader> {
        self.rpc.latest_block().await
    }

    async fn read_total_supply_at(&self, block: u64) -> AdapterResult<f64> {
        self.total_rewards(BlockTag::Number(block)).await
    }

    async fn read_current_total_supply(&self) -> AdapterResult<f64> {
        self.total_rewards(BlockTag::Latest).await
    }

    async fn read_claim_events(&self, from_block: u64, to_block: u64) -> AdapterResult<Vec<ClaimEvent>> {
        let logs = self
            .rpc
            .get_logs(
                self.distribution_contract,
                vec![json!(abi::to_hex(self.claim_topic))],
                from_block,
                to_block,
            )
            .await?;
        info!("Read {} claim events in blocks {}..{}", logs.len(), from_block, to_block);

        logs.iter()
            .map(|log| claim_from_log(log.block()?, &log.data))
            .collect()
    }

    fn epoch_block(&self) -> u64 {
        self.epoch_block
    }

    fn seconds_per_block(&self) -> f64 {
        self.seconds_per_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn claim_amount_is_last_word() {
        let receiver = abi::address_topic("0x151c2b49CdEC10B150B2763dF3d1C00D70C90956").unwrap();
        let amount = U256::from(2_500_000_000_000_000_000u128).to_be_bytes::<32>();
        let data = format!("{}{}", abi::to_hex(receiver), alloy_primitives::hex::encode(amount));

        let claim = claim_from_log(42, &data).unwrap();
        assert_eq!(claim.block_number, 42);
        assert_eq!(claim.amount, 2.5);
    }

    #[test]
    fn empty_or_garbled_claim_data_is_rejected() {
        assert!(claim_from_log(1, "0x").is_err());
        assert!(claim_from_log(1, "0xzz").is_err());
    }

    #[tokio::test]
    async fn unset_supply_contract_fails_without_a_node_call() {
        let rpc = Arc::new(RpcClient::new("http://127.0.0.1:9", 1_000).unwrap());
        let chain = ChainConfig {
            rpc_url: "http://127.0.0.1:9".to_string(),
            average_block_time_secs: 12.0,
            log_chunk_size: 1_000,
        };
        let reader = EthChainReader::new(rpc, &chain, &SupplyConfig::default()).unwrap();

        let err = reader.read_current_total_supply().await.unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
