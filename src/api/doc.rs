use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // System
        crate::api::handlers::root_handler,
        crate::api::handlers::health_handler,
        crate::api::handlers::metrics_handler,
        // Staking
        crate::api::handlers::analyze_mor_stakers_handler,
        crate::api::handlers::give_mor_reward_handler,
        crate::api::handlers::stake_info_handler,
        // Supply & market
        crate::api::handlers::total_and_circ_supply_handler,
        crate::api::handlers::prices_and_volume_handler,
        crate::api::handlers::market_cap_handler,
        crate::api::handlers::holders_by_range_handler,
        crate::api::handlers::locked_and_burnt_handler,
        crate::api::handlers::protocol_liquidity_handler
    ),
    components(
        schemas(
            crate::api::handlers::RootResponse,
            crate::api::handlers::HealthResponse,
            crate::api::handlers::ErrorResponse
        )
    ),
    tags(
        (name = "system", description = "System endpoints for health checks and metrics"),
        (name = "staking", description = "Staking statistics from the stake-event history"),
        (name = "supply", description = "Supply, market and holder metrics")
    ),
    info(
        title = "MOR Explorer Gateway API",
        version = "0.1.0",
        description = "Token-economics metrics for MOR, served from a daily-refreshed cache and computed on demand on a cache miss."
    )
)]
pub struct ApiDoc;
