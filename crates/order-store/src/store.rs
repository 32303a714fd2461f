use async_trait::async_trait;
use domain::Order;

use crate::{OrderUid, Result};

/// A window over orders in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// Creates a page from a 1-based page number and a page size.
    pub fn numbered(page: usize, limit: usize) -> Self {
        Self {
            offset: page.saturating_sub(1).saturating_mul(limit),
            limit,
        }
    }
}

/// Durable storage of order aggregates.
///
/// Implementations persist the order, its delivery, its payment and its items
/// as one unit and must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a whole aggregate atomically.
    ///
    /// Fails with `AlreadyExists` if an order with the same UID is already
    /// committed, and with `Write` naming the failing stage otherwise. On any
    /// error nothing of the aggregate is visible afterwards.
    async fn create(&self, order: &Order) -> Result<()>;

    /// Loads one aggregate.
    ///
    /// Returns None if no order has this UID.
    async fn get_by_id(&self, order_uid: &OrderUid) -> Result<Option<Order>>;

    /// Loads every aggregate in insertion order.
    ///
    /// Used to warm the cache at startup; an empty store yields an empty vector.
    async fn get_all(&self) -> Result<Vec<Order>>;

    /// Loads a page of aggregates in insertion order.
    async fn list(&self, page: Page) -> Result<Vec<Order>>;

    /// Checks that the store is reachable.
    async fn ping(&self) -> Result<()>;
}
