use crate::api::doc::ApiDoc;
use crate::api::handlers::{
    analyze_mor_stakers_handler, give_mor_reward_handler, health_handler, holders_by_range_handler,
    locked_and_burnt_handler, market_cap_handler, metrics_handler, prices_and_volume_handler,
    protocol_liquidity_handler, root_handler, stake_info_handler, total_and_circ_supply_handler,
};
use crate::api::state::AppState;
use axum::{routing::get, Router};

use axum::http::HeaderValue;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Cache-miss computations can walk a month of chain history.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub fn cors_layer(allowed_origins: &str) -> CorsLayer {
    if allowed_origins.trim() == "*" {
        return CorsLayer::permissive();
    }

    // Parse comma-separated origins, filter out invalid ones
    let origin_values: Vec<HeaderValue> = allowed_origins
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<HeaderValue>().ok()
            }
        })
        .collect();

    match origin_values.len() {
        0 => {
            tracing::warn!("No valid CORS origins found, falling back to permissive CORS");
            CorsLayer::permissive()
        }
        1 => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin_values[0].clone()))
            .allow_methods(Any)
            .allow_headers(Any),
        _ => CorsLayer::new()
            .allow_origin(AllowOrigin::list(origin_values))
            .allow_methods(Any)
            .allow_headers(Any),
    }
}

pub fn create_router(state: AppState, allowed_origins: &str) -> Router {
    let cors = cors_layer(allowed_origins);

    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::span!(
                        Level::INFO,
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                        let status = response.status().as_u16();
                        metrics::counter!(
                            "http_requests_total",
                            "status" => status.to_string(),
                            "status_class" => format!("{}xx", status / 100)
                        )
                        .increment(1);
                        metrics::histogram!("http_request_duration_seconds", "status" => status.to_string())
                            .record(latency.as_secs_f64());

                        if latency.as_millis() > 1000 {
                            tracing::warn!("Slow HTTP request: {}ms", latency.as_millis());
                        }
                    },
                )
                .on_failure(
                    |_error: tower_http::classify::ServerErrorsFailureClass, _latency: Duration, _span: &tracing::Span| {
                        metrics::counter!("http_failures_total").increment(1);
                    },
                ),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // System endpoints
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Staking
        .route("/analyze-mor-stakers", get(analyze_mor_stakers_handler))
        .route("/give_mor_reward", get(give_mor_reward_handler))
        .route("/get_stake_info", get(stake_info_handler))
        // Supply & market
        .route("/total_and_circ_supply", get(total_and_circ_supply_handler))
        .route("/prices_and_trading_volume", get(prices_and_volume_handler))
        .route("/get_market_cap", get(market_cap_handler))
        .route("/mor_holders_by_range", get(holders_by_range_handler))
        .route("/locked_and_burnt_mor", get(locked_and_burnt_handler))
        .route("/protocol_liquidity", get(protocol_liquidity_handler))
        .layer(middleware)
        .with_state(state)
}
