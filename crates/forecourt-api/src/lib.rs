//! forecourt-api - REST and WebSocket layer for the forecourt hub
//!
//! Thin route layer over the discovery, polling, metrics, and stream
//! services. All domain behavior lives in those crates; handlers translate
//! between HTTP shapes and service calls.
//!
//! # Usage
//!
//! ```ignore
//! use forecourt_api::{create_router, AppState};
//!
//! let state = AppState::new(discovery, poller, metrics, hub, catalog, polling);
//! let router = create_router(state);
//! axum::serve(listener, router).await?;
//! ```

pub mod error;
pub mod handlers;
pub mod state;

pub use error::ApiError;
pub use state::AppState;

use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the forecourt REST + WebSocket router with the given state
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Daemon liveness
        .route("/health", get(health))
        // Discovery pipeline
        .route("/api/discovery/scan", post(handlers::discovery::scan))
        .route("/api/discovery/discover", post(handlers::discovery::discover))
        .route("/api/discovery/map", post(handlers::discovery::map))
        .route("/api/discovery/full", post(handlers::discovery::full))
        // Discovery accessors
        .route("/api/discovery/services", get(handlers::discovery::list_services))
        .route(
            "/api/discovery/services/{service_id}",
            get(handlers::discovery::get_service),
        )
        .route(
            "/api/discovery/services/{service_id}/endpoints",
            get(handlers::discovery::endpoints_by_service),
        )
        .route(
            "/api/discovery/endpoints",
            get(handlers::discovery::list_endpoints),
        )
        .route(
            "/api/discovery/endpoints/search",
            get(handlers::discovery::search_endpoints),
        )
        .route(
            "/api/discovery/endpoints/{endpoint_id}",
            get(handlers::discovery::get_endpoint),
        )
        .route("/api/discovery/status", get(handlers::discovery::status))
        .route("/api/discovery/last-scan", get(handlers::discovery::last_scan))
        // Metrics
        .route("/api/metrics/enterprise", get(handlers::metrics::enterprise))
        .route("/api/metrics/fuel-trends", get(handlers::metrics::fuel_trends))
        .route("/api/metrics/auto-trends", get(handlers::metrics::auto_trends))
        // Polled endpoint catalog
        .route("/api/endpoints/health", get(handlers::endpoints::endpoint_health))
        .route("/api/endpoints/summary", get(handlers::endpoints::endpoint_summary))
        .route("/api/endpoints", post(handlers::endpoints::register_endpoint))
        .route(
            "/api/endpoints/{endpoint_id}",
            delete(handlers::endpoints::unregister_endpoint),
        )
        .route(
            "/api/endpoints/{endpoint_id}/refresh",
            post(handlers::endpoints::refresh_endpoint),
        )
        // Realtime feed
        .route("/ws", get(handlers::ws::upgrade))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "forecourt",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
}
