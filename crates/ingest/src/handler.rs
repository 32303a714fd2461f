use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domain::Order;
use order_store::OrderStore;
use service::{CreateOutcome, OrderService};

/// Receiver of decoded orders.
///
/// The adapter depends on this seam rather than on the service directly so
/// the acknowledgement logic can be exercised without a store.
#[async_trait]
pub trait OrderHandler: Send + Sync {
    /// Persists `order`, giving up after `deadline`.
    async fn handle_order(&self, order: Order, deadline: Duration)
    -> service::Result<CreateOutcome>;
}

#[async_trait]
impl<S: OrderStore> OrderHandler for OrderService<S> {
    async fn handle_order(
        &self,
        order: Order,
        deadline: Duration,
    ) -> service::Result<CreateOutcome> {
        OrderService::handle_order(self, order, deadline).await
    }
}

#[async_trait]
impl<H: OrderHandler + ?Sized> OrderHandler for Arc<H> {
    async fn handle_order(
        &self,
        order: Order,
        deadline: Duration,
    ) -> service::Result<CreateOutcome> {
        (**self).handle_order(order, deadline).await
    }
}
