//! MOR Explorer Gateway
//!
//! REST API serving token-economics metrics for the MOR token: supply, price,
//! market cap, holder distribution, locked/burned amounts, protocol liquidity
//! and staking statistics.
//!
//! # Architecture
//!
//! - **Domain**: metric documents, adapter traits and the block clock
//! - **Application**: aggregators, the cache-or-compute service and refresh jobs
//! - **Infrastructure**: node RPC, price APIs, the holder analytics service, CSV ledgers, the cache file
//! - **API**: HTTP handlers, routing and middleware
//!
//! Every metric group is read from a JSON cache document refreshed by two
//! background jobs; a missing group is computed on demand and written back.
//!
//! # Configuration
//!
//! `config.yaml` (or `CONFIG_PATH`) plus environment variables:
//! - `ETH_RPC_URL`, `ARB_RPC_URL`: node endpoints
//! - `DUNE_API_KEY`: holder analytics key
//! - `CACHE_PATH`, `PORT`: deployment overrides
//! - `RUST_LOG`: logging level (default: info), `LOG_FORMAT=json` for structured logs
//!
//! # Quick Start
//!
//! ```bash
//! export ETH_RPC_URL="https://..."
//! export ARB_RPC_URL="https://..."
//! cargo run --release
//!
//! curl http://localhost:8000/health
//! curl http://localhost:8000/total_and_circ_supply
//! ```

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use mor_explorer_gateway::api::routes::create_router;
use mor_explorer_gateway::api::state::AppState;
use mor_explorer_gateway::application::{Adapters, MetricsService, MetricsSettings, Scheduler};
use mor_explorer_gateway::config::AppConfig;
use mor_explorer_gateway::domain::{ChainSource, MarketSource};
use mor_explorer_gateway::infrastructure::{
    CsvStakingLedger, CsvSupplyLedger, DuneClient, EthChainReader, JsonFileCache, MarketClient, RpcClient,
    TransferLogReader, UniswapLiquidityReader,
};
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = EnvFilter::new(env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_adapters(config: &AppConfig) -> anyhow::Result<Adapters> {
    for warning in config.unset_settings() {
        tracing::warn!("{}", warning);
    }

    let mainnet_rpc = Arc::new(
        RpcClient::new(&config.mainnet.rpc_url, config.mainnet.log_chunk_size)
            .context("Failed to build mainnet RPC client")?,
    );
    let arbitrum_rpc = Arc::new(
        RpcClient::new(&config.arbitrum.rpc_url, config.arbitrum.log_chunk_size)
            .context("Failed to build arbitrum RPC client")?,
    );

    let chain: Arc<dyn ChainSource> = Arc::new(
        EthChainReader::new(mainnet_rpc, &config.mainnet, &config.supply)
            .context("Invalid supply contract configuration")?,
    );
    let market: Arc<dyn MarketSource> =
        Arc::new(MarketClient::new(&config.market).context("Failed to build market client")?);
    let holders = Arc::new(DuneClient::new(&config.holders).context("Failed to build holder client")?);
    let supply_ledger = Arc::new(CsvSupplyLedger::new(&config.supply.circulating_supply_csv, chain.clone()));
    let staking = Arc::new(CsvStakingLedger::new(
        &config.staking.events_csv,
        &config.staking.emissions_csv,
    ));
    let locked_burned = Arc::new(
        TransferLogReader::new(arbitrum_rpc.clone(), &config.arbitrum, &config.token)
            .context("Failed to build transfer log reader")?,
    );
    let liquidity = Arc::new(
        UniswapLiquidityReader::new(arbitrum_rpc, market.clone(), &config.liquidity, &config.token.mor_token)
            .context("Invalid liquidity configuration")?,
    );

    Ok(Adapters {
        chain,
        market,
        holders,
        supply_ledger,
        staking,
        locked_burned,
        liquidity,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    let config = AppConfig::load(&config_path)?;

    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    };

    let adapters = build_adapters(&config)?;
    let cache = Arc::new(JsonFileCache::new(&config.cache.path));
    tracing::info!("Metric cache file: {}", config.cache.path);

    let metrics_service = Arc::new(MetricsService::new(
        adapters,
        cache,
        MetricsSettings::from_config(&config),
    ));

    let jobs = Scheduler::new(metrics_service.clone(), config.scheduler.clone()).spawn();

    let state = AppState {
        metrics_service,
        prometheus,
    };
    let app = create_router(state, &config.server.allowed_origins);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address {}", addr))?;
    tracing::info!("MOR explorer gateway running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error during operation")?;

    for job in jobs {
        job.abort();
    }
    tracing::info!("Refresh jobs stopped");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C) to initiate graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
