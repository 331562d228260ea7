//! HTTP client for the DEX price aggregator and the price-history API.

use crate::config::MarketConfig;
use crate::domain::{AdapterError, AdapterResult, MarketSource, PriceHistory};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct DexPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DexPair {
    price_usd: Option<String>,
}

/// DexScreener + CoinGecko client.
#[derive(Clone)]
pub struct MarketClient {
    client: Client,
    spot_price_url: String,
    price_history_url: String,
    counter_asset_price_url: String,
}

impl MarketClient {
    pub fn new(config: &MarketConfig) -> AdapterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("MorExplorerGateway/1.0")
            .build()?;

        Ok(Self {
            client,
            spot_price_url: config.spot_price_url.clone(),
            price_history_url: config.price_history_url.clone(),
            counter_asset_price_url: config.counter_asset_price_url.clone(),
        })
    }

    async fn get_json(&self, service: &'static str, url: &str) -> AdapterResult<Value> {
        debug!("Fetching from {}: {}", service, url);
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Status {
                service,
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

/// First pair's `priceUsd` from a DexScreener response body.
fn parse_spot_price(body: Value) -> AdapterResult<f64> {
    let parsed: DexPairsResponse = serde_json::from_value(body)
        .map_err(|e| AdapterError::decode(format!("dex response: {}", e)))?;
    let price = parsed
        .pairs
        .and_then(|pairs| pairs.into_iter().next())
        .and_then(|pair| pair.price_usd)
        .ok_or_else(|| AdapterError::decode("dex response has no priced pair"))?;
    price
        .parse::<f64>()
        .map_err(|e| AdapterError::decode(format!("priceUsd {}: {}", price, e)))
}

/// First `usd` number found in a `simple/price` response (`{"<id>": {"usd": 1.0}}`).
fn parse_simple_price(body: &Value) -> AdapterResult<f64> {
    body.as_object()
        .and_then(|assets| assets.values().find_map(|quote| quote.get("usd")?.as_f64()))
        .ok_or_else(|| AdapterError::decode("simple price response has no usd quote"))
}

#[async_trait]
impl MarketSource for MarketClient {
    async fn read_spot_price(&self) -> AdapterResult<f64> {
        match self.get_json("dex aggregator", &self.spot_price_url).await {
            Ok(body) => parse_spot_price(body),
            // Upstream outage reads as a zero price rather than an error.
            Err(AdapterError::Status { status, .. }) => {
                warn!("Spot price unavailable (status {}), using 0.0", status);
                Ok(0.0)
            }
            Err(e) => Err(e),
        }
    }

    async fn read_price_history(&self) -> AdapterResult<PriceHistory> {
        let body = self.get_json("price history", &self.price_history_url).await?;
        serde_json::from_value(body).map_err(|e| AdapterError::decode(format!("price history: {}", e)))
    }

    async fn read_counter_asset_price(&self) -> AdapterResult<f64> {
        let body = self
            .get_json("counter-asset price", &self.counter_asset_price_url)
            .await?;
        parse_simple_price(&body)
    }
}
