//! In-process tests for the HTTP surface.
//!
//! The router is driven with `tower::ServiceExt::oneshot` against fake
//! adapters and the in-memory cache; no network or files are touched.
//! Run with: `cargo test --test api_test`

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mor_explorer_gateway::api::routes::create_router;
use mor_explorer_gateway::api::state::AppState;
use mor_explorer_gateway::application::{Adapters, MetricsService, MetricsSettings};
use mor_explorer_gateway::domain::{
    AdapterError, AdapterResult, BlockHeader, CacheDocument, CacheStore, ChainSource, CirculatingSupplyRow,
    ClaimEvent, EmissionDay, HolderBalance, HolderSource, LiquiditySource, LockedBurnedSeries, LockedBurnedSource,
    MarketSource, PriceHistory, ProtocolLiquidity, StakeEvent, StakingLedger, SupplyLedger,
};
use mor_explorer_gateway::infrastructure::MemoryCache;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Every call fails; stands in for any source a test does not exercise.
struct Offline;

fn offline<T>() -> AdapterResult<T> {
    Err(AdapterError::decode("source offline"))
}

#[async_trait]
impl ChainSource for Offline {
    async fn latest_block(&self) -> AdapterResult<BlockHeader> {
        offline()
    }
    async fn read_total_supply_at(&self, _block: u64) -> AdapterResult<f64> {
        offline()
    }
    async fn read_current_total_supply(&self) -> AdapterResult<f64> {
        offline()
    }
    async fn read_claim_events(&self, _from: u64, _to: u64) -> AdapterResult<Vec<ClaimEvent>> {
        offline()
    }
    fn epoch_block(&self) -> u64 {
        0
    }
    fn seconds_per_block(&self) -> f64 {
        12.0
    }
}

#[async_trait]
impl MarketSource for Offline {
    async fn read_spot_price(&self) -> AdapterResult<f64> {
        offline()
    }
    async fn read_price_history(&self) -> AdapterResult<PriceHistory> {
        offline()
    }
    async fn read_counter_asset_price(&self) -> AdapterResult<f64> {
        offline()
    }
}

#[async_trait]
impl HolderSource for Offline {
    async fn read_holder_balances(&self) -> AdapterResult<Vec<HolderBalance>> {
        offline()
    }
}

#[async_trait]
impl SupplyLedger for Offline {
    async fn read_and_update_circulating_supply_csv(&self) -> AdapterResult<Vec<CirculatingSupplyRow>> {
        offline()
    }
}

#[async_trait]
impl StakingLedger for Offline {
    async fn read_stake_events(&self) -> AdapterResult<Vec<StakeEvent>> {
        offline()
    }
    async fn read_emission_schedule(&self) -> AdapterResult<Vec<EmissionDay>> {
        offline()
    }
}

#[async_trait]
impl LockedBurnedSource for Offline {
    async fn read_locked_and_burned_series(&self) -> AdapterResult<LockedBurnedSeries> {
        offline()
    }
}

#[async_trait]
impl LiquiditySource for Offline {
    async fn read_protocol_liquidity(&self) -> AdapterResult<ProtocolLiquidity> {
        Err(AdapterError::decode("no liquidity positions for owner"))
    }
}

struct FixedChain;

#[async_trait]
impl ChainSource for FixedChain {
    async fn latest_block(&self) -> AdapterResult<BlockHeader> {
        Ok(BlockHeader {
            number: 20_000_000,
            timestamp: 1_718_020_800,
        })
    }
    async fn read_total_supply_at(&self, _block: u64) -> AdapterResult<f64> {
        Ok(1000.0)
    }
    async fn read_current_total_supply(&self) -> AdapterResult<f64> {
        Ok(1000.0)
    }
    async fn read_claim_events(&self, _from: u64, _to: u64) -> AdapterResult<Vec<ClaimEvent>> {
        Ok(vec![
            ClaimEvent {
                block_number: 19_000_000,
                amount: 10.5,
            },
            ClaimEvent {
                block_number: 19_500_000,
                amount: 4.5,
            },
        ])
    }
    fn epoch_block(&self) -> u64 {
        18_908_895
    }
    fn seconds_per_block(&self) -> f64 {
        12.0
    }
}

struct FixedMarket {
    spot: f64,
}

#[async_trait]
impl MarketSource for FixedMarket {
    async fn read_spot_price(&self) -> AdapterResult<f64> {
        Ok(self.spot)
    }
    async fn read_price_history(&self) -> AdapterResult<PriceHistory> {
        offline()
    }
    async fn read_counter_asset_price(&self) -> AdapterResult<f64> {
        offline()
    }
}

struct FixedHolders(Vec<HolderBalance>);

#[async_trait]
impl HolderSource for FixedHolders {
    async fn read_holder_balances(&self) -> AdapterResult<Vec<HolderBalance>> {
        Ok(self.0.clone())
    }
}

fn offline_adapters() -> Adapters {
    Adapters {
        chain: Arc::new(Offline),
        market: Arc::new(Offline),
        holders: Arc::new(Offline),
        supply_ledger: Arc::new(Offline),
        staking: Arc::new(Offline),
        locked_burned: Arc::new(Offline),
        liquidity: Arc::new(Offline),
    }
}

fn app(adapters: Adapters, cache: Arc<MemoryCache>) -> Router {
    let service = Arc::new(MetricsService::new(adapters, cache, MetricsSettings::default()));
    let state = AppState {
        metrics_service: service,
        prometheus: None,
    };
    create_router(state, "*")
}

async fn get(app: Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn holder(address: &str, amount: f64) -> HolderBalance {
    HolderBalance {
        address: address.to_string(),
        amount,
    }
}

#[tokio::test]
async fn root_says_hello() {
    let (status, body) = get(app(offline_adapters(), Arc::new(MemoryCache::new())), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "Hello World"}));
}

#[tokio::test]
async fn health_reports_cached_group_count() {
    let mut document = CacheDocument::new();
    document.insert("market_cap".to_string(), json!({}));
    document.insert("stake_info".to_string(), json!({}));
    let cache = Arc::new(MemoryCache::with_document(document));

    let (status, body) = get(app(offline_adapters(), cache), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cached_groups"], 2);
    assert!(body.get("version").is_some());
}

#[tokio::test]
async fn cached_group_is_served_without_touching_adapters() {
    let mut document = CacheDocument::new();
    document.insert(
        "market_cap".to_string(),
        json!({"total_supply_market_cap": 1234.5, "circulating_supply_market_cap": 99.25}),
    );
    let cache = Arc::new(MemoryCache::with_document(document));

    let (status, body) = get(app(offline_adapters(), cache), "/get_market_cap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_supply_market_cap"], 1234.5);
    assert_eq!(body["circulating_supply_market_cap"], 99.25);
}

#[tokio::test]
async fn market_cap_miss_is_computed_and_cached() {
    let mut adapters = offline_adapters();
    adapters.chain = Arc::new(FixedChain);
    adapters.market = Arc::new(FixedMarket { spot: 2.0 });
    let cache = Arc::new(MemoryCache::new());

    let (status, body) = get(app(adapters, cache.clone()), "/get_market_cap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_supply_market_cap"], 2000.0);
    assert_eq!(body["circulating_supply_market_cap"], 30.0);

    let document = cache.read().await;
    assert_eq!(document["market_cap"]["total_supply_market_cap"], 2000.0);
}

#[tokio::test]
async fn zero_spot_price_gives_zero_market_caps() {
    let mut adapters = offline_adapters();
    adapters.chain = Arc::new(FixedChain);
    adapters.market = Arc::new(FixedMarket { spot: 0.0 });

    let (status, body) = get(app(adapters, Arc::new(MemoryCache::new())), "/get_market_cap").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_supply_market_cap"], 0.0);
    assert_eq!(body["circulating_supply_market_cap"], 0.0);
}

#[tokio::test]
async fn holders_are_bucketed_in_range_order() {
    let mut adapters = offline_adapters();
    adapters.holders = Arc::new(FixedHolders(vec![
        holder("0x0000000000000000000000000000000000000000", 100.0),
        holder("0xaaa", 0.0005),
        holder("0xbbb", 25.0),
        holder("0xccc", 50.0),
        holder("0xddd", 750.0),
        holder("0xeee", 600_000.0),
    ]));

    let (status, body) = get(app(adapters, Arc::new(MemoryCache::new())), "/mor_holders_by_range").await;
    assert_eq!(status, StatusCode::OK);

    let counts = body["range_counts"].as_object().unwrap();
    let labels: Vec<&str> = counts.keys().map(String::as_str).collect();
    assert_eq!(
        labels,
        vec!["0-50", "50-100", "100-200", "200-500", "500-1000", "1000-10000", "10000-500000"]
    );
    assert_eq!(counts["0-50"], 1);
    assert_eq!(counts["50-100"], 1);
    assert_eq!(counts["500-1000"], 1);
    assert_eq!(counts["10000-500000"], 0);
}

#[tokio::test]
async fn adapter_failure_maps_to_500_with_detail() {
    let cache = Arc::new(MemoryCache::new());
    let (status, body) = get(app(offline_adapters(), cache.clone()), "/protocol_liquidity").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("An error occurred: "));
    assert!(detail.contains("no liquidity positions"));
    assert!(cache.read().await.is_empty());
}

#[tokio::test]
async fn staking_failure_maps_to_500() {
    let (status, body) = get(app(offline_adapters(), Arc::new(MemoryCache::new())), "/analyze-mor-stakers").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("source offline"));
}

#[tokio::test]
async fn metrics_without_recorder_is_unavailable() {
    let response = app(offline_adapters(), Arc::new(MemoryCache::new()))
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let response = app(offline_adapters(), Arc::new(MemoryCache::new()))
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let headers = response.headers();
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn openapi_document_lists_metric_paths() {
    let (status, body) = get(app(offline_adapters(), Arc::new(MemoryCache::new())), "/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    let paths = body["paths"].as_object().unwrap();
    assert!(paths.contains_key("/total_and_circ_supply"));
    assert!(paths.contains_key("/give_mor_reward"));
}
