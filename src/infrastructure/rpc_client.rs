//! JSON-RPC 2.0 client for an Ethereum-compatible read node.
//!
//! Thin wrapper over `reqwest`: one POST per call, no retries. Timeouts are
//! whatever the HTTP client is configured with.

use crate::domain::{AdapterError, AdapterResult, BlockHeader};
use crate::infrastructure::abi;
use alloy_primitives::{Address, Bytes};
use jsonrpc_core::{Id, MethodCall, Output, Params, Version};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Block selector for `eth_call`.
#[derive(Debug, Clone, Copy)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    fn to_param(self) -> Value {
        match self {
            BlockTag::Latest => json!("latest"),
            BlockTag::Number(n) => json!(format!("0x{:x}", n)),
        }
    }
}

/// A log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub block_number: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

impl RpcLog {
    pub fn block(&self) -> AdapterResult<u64> {
        abi::parse_quantity(&self.block_number)
    }
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: String,
    timestamp: String,
}

pub struct RpcClient {
    client: Client,
    url: String,
    log_chunk_size: u64,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, log_chunk_size: u64) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: url.to_string(),
            log_chunk_size: log_chunk_size.max(1),
            next_id: AtomicU64::new(1),
        })
    }

    /// Send one JSON-RPC call and decode its `result`.
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> AdapterResult<T> {
        let call = MethodCall {
            jsonrpc: Some(Version::V2),
            method: method.to_string(),
            params: Params::Array(params),
            id: Id::Num(self.next_id.fetch_add(1, Ordering::Relaxed)),
        };
        debug!("RPC {} -> {}", method, self.url);

        let response = self.client.post(&self.url).json(&call).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                service: "node",
                status: status.as_u16(),
            });
        }

        match response.json::<Output>().await? {
            Output::Success(success) => serde_json::from_value(success.result)
                .map_err(|e| AdapterError::decode(format!("{} result: {}", method, e))),
            Output::Failure(failure) => Err(AdapterError::Rpc {
                method: method.to_string(),
                message: failure.error.message,
            }),
        }
    }

    pub async fn latest_block(&self) -> AdapterResult<BlockHeader> {
        let block: Option<RpcBlock> = self
            .request("eth_getBlockByNumber", vec![json!("latest"), json!(false)])
            .await?;
        let block = block.ok_or_else(|| AdapterError::decode("node returned no latest block"))?;
        Ok(BlockHeader {
            number: abi::parse_quantity(&block.number)?,
            timestamp: abi::parse_quantity(&block.timestamp)? as i64,
        })
    }

    /// `eth_call`, returning the raw return data.
    pub async fn call(&self, to: Address, data: &[u8], block: BlockTag) -> AdapterResult<Bytes> {
        let ret: String = self
            .request(
                "eth_call",
                vec![json!({ "to": abi::to_hex(to), "data": abi::to_hex(data) }), block.to_param()],
            )
            .await?;
        ret.parse()
            .map_err(|e| AdapterError::decode(format!("eth_call returned non-hex data: {}", e)))
    }

    /// `eth_getLogs` over `[from_block, to_block]`, split into `log_chunk_size` windows.
    pub async fn get_logs(
        &self,
        address: Address,
        topics: Vec<Value>,
        from_block: u64,
        to_block: u64,
    ) -> AdapterResult<Vec<RpcLog>> {
        let mut logs = Vec::new();
        for (start, end) in chunk_ranges(from_block, to_block, self.log_chunk_size) {
            let filter = json!({
                "address": abi::to_hex(address),
                "topics": topics,
                "fromBlock": format!("0x{:x}", start),
                "toBlock": format!("0x{:x}", end),
            });
            let mut page: Vec<RpcLog> = self.request("eth_getLogs", vec![filter]).await?;
            debug!("eth_getLogs {}..{}: {} logs", start, end, page.len());
            logs.append(&mut page);
        }
        Ok(logs)
    }
}

/// Inclusive block windows of at most `size` blocks covering `[from, to]`.
pub fn chunk_ranges(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
    let size = size.max(1);
    let mut ranges = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(size - 1).min(to);
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_range_inclusively() {
        assert_eq!(chunk_ranges(10, 25, 10), vec![(10, 19), (20, 25)]);
        assert_eq!(chunk_ranges(5, 5, 100), vec![(5, 5)]);
        assert!(chunk_ranges(6, 5, 100).is_empty());
    }

    #[test]
    fn block_tag_params() {
        assert_eq!(BlockTag::Latest.to_param(), json!("latest"));
        assert_eq!(BlockTag::Number(255).to_param(), json!("0xff"));
    }

    #[test]
    fn failure_output_decodes() {
        let raw = r#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"missing trie node"},"id":1}"#;
        match serde_json::from_str::<Output>(raw).unwrap() {
            Output::Failure(f) => assert_eq!(f.error.message, "missing trie node"),
            Output::Success(_) => panic!("expected failure"),
        }
    }
}
