//! Route table for the key-value API.

use crate::handlers::{self, KvState};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the full HTTP router over a registry.
pub fn kv_router(state: KvState) -> Router {
    Router::new()
        // Creatives
        .route(
            "/api/v1/kv/creatives",
            post(handlers::add_creative).get(handlers::list_creatives),
        )
        .route("/api/v1/kv/creatives/:id", get(handlers::get_creative))
        // Line items
        .route(
            "/api/v1/kv/lineitems",
            post(handlers::add_line_item).get(handlers::list_line_items),
        )
        .route("/api/v1/kv/lineitems/:id", get(handlers::get_line_item))
        .route(
            "/api/v1/kv/lineitems/:id/pacing",
            get(handlers::pacing_for_slot),
        )
        // Associations
        .route(
            "/api/v1/kv/lineitems/:id/creatives",
            post(handlers::link_creatives).delete(handlers::unlink_creatives),
        )
        .route(
            "/api/v1/kv/lineitems/:id/creatives/:creative_id",
            post(handlers::link_creative).delete(handlers::unlink_creative),
        )
        // Targeting & delivery
        .route("/api/v1/kv/query", get(handlers::query))
        .route("/api/v1/kv/impressions", post(handlers::report_impressions))
        .route("/api/v1/kv/flush", post(handlers::flush))
        .route("/api/v1/kv/stats", get(handlers::stats))
        // Operational endpoints
        .route("/health", get(handlers::health_check))
        .route("/live", get(handlers::liveness))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
