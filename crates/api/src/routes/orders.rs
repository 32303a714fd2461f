//! Order lookup endpoints.

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::OrderUid;
use domain::Order;
use order_store::{OrderStore, Page};
use serde::{Deserialize, Serialize};
use service::OrderService;

use crate::error::ApiError;

/// Largest page the list endpoint returns.
pub const MAX_PAGE_SIZE: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 10;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub service: Arc<OrderService<S>>,
    /// Upper bound for a single lookup, including the store fallback.
    pub read_timeout: Duration,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

impl ListParams {
    /// Returns the 1-based page number and the page size, both clamped.
    pub fn resolve(&self) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub order: Arc<Order>,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub page: usize,
    pub limit: usize,
    pub orders: Vec<Order>,
}

/// GET /api/v1/orders/{id} — one order, from the cache when possible.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_uid = OrderUid::new(id);
    if order_uid.is_blank() {
        return Err(ApiError::BadRequest("Order ID is required".to_string()));
    }

    let order = state
        .service
        .get_info_within(&order_uid, state.read_timeout)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;

    Ok(Json(OrderResponse { order }))
}

/// GET /api/v1/orders — a page of stored orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let (page, limit) = params.resolve();

    let orders = state.service.list(Page::numbered(page, limit)).await?;

    Ok(Json(OrderListResponse {
        page,
        limit,
        orders,
    }))
}
