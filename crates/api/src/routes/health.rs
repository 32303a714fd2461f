//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use order_store::OrderStore;
use serde::Serialize;

use super::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health — reports whether the store answers within the read timeout.
pub async fn check<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> (StatusCode, Json<HealthResponse>) {
    match tokio::time::timeout(state.read_timeout, state.service.ping()).await {
        Ok(Ok(())) => (StatusCode::OK, Json(HealthResponse { status: "ok" })),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "health check failed");
            unavailable()
        }
        Err(_) => {
            tracing::warn!(timeout = ?state.read_timeout, "health check timed out");
            unavailable()
        }
    }
}

fn unavailable() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "unavailable",
        }),
    )
}
