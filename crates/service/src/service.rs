use std::sync::Arc;
use std::time::{Duration, Instant};

use common::OrderUid;
use domain::Order;
use order_cache::OrderCache;
use order_store::{OrderStore, Page};

use crate::error::{Result, ServiceError};

/// What `create` did with an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The aggregate was committed and published to the cache.
    Created,
    /// An aggregate with this UID was already committed; nothing changed.
    Duplicate,
}

/// Summary of a cache warm-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Aggregates read from the store.
    pub loaded: usize,
    /// Aggregates now held by the cache.
    pub cached: usize,
    /// Aggregates refused by the cache's capacity policy.
    pub rejected: usize,
}

/// Orchestrates the order store and the order cache.
///
/// Reads go cache first and fall back to the store, publishing what they find.
/// Writes go to the store first and are published only after commit, so the
/// cache never holds an order the store does not. No cache guard is held while
/// the store is awaited.
pub struct OrderService<S: OrderStore> {
    store: S,
    cache: OrderCache,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a service over an explicitly constructed store and cache.
    pub fn new(store: S, cache: OrderCache) -> Self {
        Self { store, cache }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the cache.
    pub fn cache(&self) -> &OrderCache {
        &self.cache
    }

    /// Looks up an order, cache first.
    ///
    /// Returns None when the store has no such order. Misses are not cached,
    /// so an order ingested after a miss is found on the next lookup.
    #[tracing::instrument(skip(self))]
    pub async fn get_info(&self, order_uid: &OrderUid) -> Result<Option<Arc<Order>>> {
        if let Some(cached) = self.cache.get(order_uid).await {
            return Ok(Some(cached));
        }

        metrics::counter!("orders_store_reads_total").increment(1);
        let Some(order) = self
            .store
            .get_by_id(order_uid)
            .await
            .map_err(|e| ServiceError::store("get_by_id", order_uid, e))?
        else {
            tracing::debug!("order not found");
            return Ok(None);
        };

        // Two concurrent misses may both get here; they publish equal data.
        let order = Arc::new(order);
        self.cache.put(order.clone()).await;
        Ok(Some(order))
    }

    /// Like [`get_info`](Self::get_info) but gives up after `deadline`.
    pub async fn get_info_within(
        &self,
        order_uid: &OrderUid,
        deadline: Duration,
    ) -> Result<Option<Arc<Order>>> {
        tokio::time::timeout(deadline, self.get_info(order_uid))
            .await
            .map_err(|_| ServiceError::Timeout {
                operation: "get_info",
                order_uid: order_uid.clone(),
                after: deadline,
            })?
    }

    /// Validates and persists an aggregate, then publishes it to the cache.
    ///
    /// A duplicate UID is a successful no-op: delivery is at-least-once, so
    /// the same order may arrive more than once. The cache is left alone in
    /// that case and is filled from the store on the next read.
    #[tracing::instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    pub async fn create(&self, order: Order) -> Result<CreateOutcome> {
        order.validate()?;

        match self.store.create(&order).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                metrics::counter!("orders_duplicates_total").increment(1);
                tracing::info!("order already stored, skipping");
                return Ok(CreateOutcome::Duplicate);
            }
            Err(e) => return Err(ServiceError::store("create", &order.order_uid, e)),
        }

        metrics::counter!("orders_created_total").increment(1);
        let admission = self.cache.put(Arc::new(order)).await;
        tracing::debug!(?admission, "order stored");
        Ok(CreateOutcome::Created)
    }

    /// Ingestion entry point: `create` bounded by `deadline`, with logging.
    ///
    /// On timeout the store write is abandoned (an uncommitted transaction
    /// rolls back) and the cache is untouched, so the caller can redeliver.
    /// Use [`ServiceError::is_retryable`] to choose between dropping and
    /// redelivering the message.
    pub async fn handle_order(&self, order: Order, deadline: Duration) -> Result<CreateOutcome> {
        let order_uid = order.order_uid.clone();
        let started = Instant::now();
        tracing::debug!(%order_uid, "processing order message");

        let result = match tokio::time::timeout(deadline, self.create(order)).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout {
                operation: "create",
                order_uid: order_uid.clone(),
                after: deadline,
            }),
        };

        metrics::histogram!("orders_handle_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(outcome) => tracing::info!(%order_uid, ?outcome, "order processed"),
            Err(ServiceError::Store { source, .. }) => tracing::error!(
                %order_uid,
                stage = ?source.stage(),
                error = %source,
                "failed to store order"
            ),
            Err(e) => tracing::warn!(%order_uid, error = %e, "order not processed"),
        }
        result
    }

    /// Fills the cache from the full store contents.
    ///
    /// Each aggregate goes through the regular capacity policy. A failure
    /// leaves the cache as it was; serving continues with read-through.
    #[tracing::instrument(skip(self))]
    pub async fn restore_cache(&self) -> Result<RestoreReport> {
        let orders = self.store.get_all().await.map_err(|source| {
            tracing::error!(error = %source, "cache restore failed");
            ServiceError::Store {
                operation: "get_all",
                order_uid: None,
                source,
            }
        })?;

        let mut report = RestoreReport {
            loaded: orders.len(),
            ..Default::default()
        };
        for order in orders {
            if self.cache.put(Arc::new(order)).await.is_cached() {
                report.cached += 1;
            } else {
                report.rejected += 1;
            }
        }

        if report.rejected > 0 {
            tracing::warn!(
                loaded = report.loaded,
                rejected = report.rejected,
                capacity = self.cache.capacity(),
                "cache capacity reached during restore"
            );
        }
        tracing::info!(loaded = report.loaded, cached = report.cached, "cache restored");
        Ok(report)
    }

    /// Lists stored orders in insertion order. Bypasses the cache.
    pub async fn list(&self, page: Page) -> Result<Vec<Order>> {
        self.store.list(page).await.map_err(|source| ServiceError::Store {
            operation: "list",
            order_uid: None,
            source,
        })
    }

    /// Checks that the store is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await.map_err(|source| ServiceError::Store {
            operation: "ping",
            order_uid: None,
            source,
        })
    }
}
