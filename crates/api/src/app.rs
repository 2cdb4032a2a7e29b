use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{calendar, gifts, health, inactivity};
use crate::services::GiftDeliveryService;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub delivery: GiftDeliveryService,
}

pub fn create_app(config: Config, pool: PgPool, delivery: GiftDeliveryService) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        pool,
        config: config.clone(),
        delivery,
    };

    let cors = if config.security.cors_origins.is_empty() {
        // Development default
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let gift_routes = Router::new()
        .route("/api/v1/gifts", post(gifts::upload_gift).get(gifts::list_gifts))
        .route("/api/v1/gifts/count", get(gifts::count_gifts))
        .route("/api/v1/gifts/pending", get(gifts::pending_gifts))
        .route("/api/v1/gifts/:id", delete(gifts::stop_gift))
        .route("/api/v1/gifts/:id/download", get(gifts::download_gift))
        .route("/api/v1/gifts/:id/delivery", post(gifts::configure_delivery))
        .route(
            "/api/v1/inactivity-checks",
            post(inactivity::schedule_inactivity_check),
        )
        .route("/api/v1/calendar", get(calendar::get_calendar))
        .route("/api/v1/receivers", get(calendar::get_receivers))
        .layer(DefaultBodyLimit::max(config.limits.max_upload_bytes));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(gift_routes)
        // Route layer so MatchedPath is available for metric labels
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
