use crate::api::state::AppState;
use crate::domain::{
    HolderDistribution, LockedAndBurned, MarketCap, PricesAndVolume, ProtocolLiquidity, RewardRates, StakeInfo,
    StakingMetrics, SupplyResponse,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

#[allow(unused_imports)]
use serde_json::json; // Used in utoipa::path examples

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error body shared by every metric endpoint.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub detail: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn internal_error(endpoint: &str, e: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    error!("{} failed: {:#}", endpoint, e);
    metrics::counter!("api_errors_total", "endpoint" => endpoint.to_string()).increment(1);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: format!("An error occurred: {:#}", e),
        }),
    )
}

fn respond<T>(endpoint: &str, result: anyhow::Result<T>) -> ApiResult<T> {
    result.map(Json).map_err(|e| internal_error(endpoint, e))
}

#[derive(Serialize, ToSchema)]
pub struct RootResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
    /// Metric groups currently in the cache document
    pub cached_groups: usize,
}

#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses((status = 200, description = "Service greeting", body = RootResponse))
)]
pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Hello World".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Health check passed", body = HealthResponse))
)]
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: VERSION.to_string(),
        backend: "rust-axum-onion".to_string(),
        cached_groups: state.metrics_service.cached_group_count().await,
    })
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "system",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain")
    )
)]
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed".to_string()),
    }
}

// ============================================================================
// Staking
// ============================================================================

/// Staker counts, stake durations, multipliers, pool rewards and today's emissions.
#[utoipa::path(
    get,
    path = "/analyze-mor-stakers",
    tag = "staking",
    responses(
        (status = 200, description = "Staking analysis", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn analyze_mor_stakers_handler(State(state): State<AppState>) -> ApiResult<StakingMetrics> {
    respond("analyze-mor-stakers", state.metrics_service.staking_metrics().await)
}

/// Daily reward per staked token for each pool.
#[utoipa::path(
    get,
    path = "/give_mor_reward",
    tag = "staking",
    responses(
        (status = 200, description = "Per-pool reward rates", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn give_mor_reward_handler(State(state): State<AppState>) -> ApiResult<RewardRates> {
    respond("give_mor_reward", state.metrics_service.give_mor_reward().await)
}

#[utoipa::path(
    get,
    path = "/get_stake_info",
    tag = "staking",
    responses(
        (status = 200, description = "Stake-time and power-multiplier histograms", body = serde_json::Value,
         example = json!({
             "stake_time": {"ranges": ["0-30", "30-90"], "frequencies": [12, 4]},
             "power_multiplier": {"ranges": ["<1", "1-1.5"], "frequencies": [0, 9]}
         })),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn stake_info_handler(State(state): State<AppState>) -> ApiResult<StakeInfo> {
    respond("get_stake_info", state.metrics_service.stake_info().await)
}

// ============================================================================
// Supply & market
// ============================================================================

/// Daily total and circulating supply, newest first.
#[utoipa::path(
    get,
    path = "/total_and_circ_supply",
    tag = "supply",
    responses(
        (status = 200, description = "Joined supply series", body = serde_json::Value,
         example = json!({"data": [{
             "date": "2024-06-10",
             "total_supply": 1520345.1234,
             "circulating_supply": 402311.5,
             "total_claimed_that_day": 1203.25
         }]})),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn total_and_circ_supply_handler(State(state): State<AppState>) -> ApiResult<SupplyResponse> {
    respond("total_and_circ_supply", state.metrics_service.total_and_circ_supply().await)
}

#[utoipa::path(
    get,
    path = "/prices_and_trading_volume",
    tag = "supply",
    responses(
        (status = 200, description = "Daily average price and volume, newest first", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn prices_and_volume_handler(State(state): State<AppState>) -> ApiResult<PricesAndVolume> {
    respond("prices_and_trading_volume", state.metrics_service.prices_and_volume().await)
}

/// Supply times spot price. Reports zero when the price source is down.
#[utoipa::path(
    get,
    path = "/get_market_cap",
    tag = "supply",
    responses(
        (status = 200, description = "Market capitalization", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn market_cap_handler(State(state): State<AppState>) -> ApiResult<MarketCap> {
    respond("get_market_cap", state.metrics_service.market_cap().await)
}

#[utoipa::path(
    get,
    path = "/mor_holders_by_range",
    tag = "supply",
    responses(
        (status = 200, description = "Holder counts per balance range", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn holders_by_range_handler(State(state): State<AppState>) -> ApiResult<HolderDistribution> {
    respond("mor_holders_by_range", state.metrics_service.holders_by_range().await)
}

#[utoipa::path(
    get,
    path = "/locked_and_burnt_mor",
    tag = "supply",
    responses(
        (status = 200, description = "Cumulative locked and burned MOR", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn locked_and_burnt_handler(State(state): State<AppState>) -> ApiResult<LockedAndBurned> {
    respond("locked_and_burnt_mor", state.metrics_service.locked_and_burnt_mor().await)
}

#[utoipa::path(
    get,
    path = "/protocol_liquidity",
    tag = "supply",
    responses(
        (status = 200, description = "Protocol-owned liquidity in MOR, stETH and USD", body = serde_json::Value),
        (status = 500, description = "Computation failed", body = ErrorResponse)
    )
)]
pub async fn protocol_liquidity_handler(State(state): State<AppState>) -> ApiResult<ProtocolLiquidity> {
    respond("protocol_liquidity", state.metrics_service.protocol_liquidity().await)
}
