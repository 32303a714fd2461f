//! HTTP read API for the order tracker.
//!
//! Serves order lookups from the order service, which answers from the cache
//! and falls back to the store, along with health and Prometheus metrics
//! endpoints and a small browser page for looking orders up by UID.

pub mod config;
pub mod error;
pub mod routes;

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
///
/// `static_dir` holds the lookup page: `index.html` is served at `/` and the
/// whole directory under `/static`.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    static_dir: &Path,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route("/api/v1/health", get(routes::health::check::<S>))
        .route("/api/v1/orders", get(routes::orders::list::<S>))
        .route("/api/v1/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
