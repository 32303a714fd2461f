use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain::Order;
use tokio::sync::RwLock;

use crate::{
    OrderUid, Result, StoreError, WriteStage,
    store::{OrderStore, Page},
};

#[derive(Default)]
struct Tables {
    orders: Vec<Order>,
    index: HashMap<OrderUid, usize>,
}

#[derive(Default)]
struct Hooks {
    reads: AtomicUsize,
    writes: AtomicUsize,
    unavailable: AtomicBool,
    fail_at: Mutex<Option<WriteStage>>,
    reject_at: Mutex<Option<WriteStage>>,
    latency: Mutex<Option<Duration>>,
}

/// In-memory order store for tests and local runs.
///
/// Provides the same interface and write semantics as the PostgreSQL store:
/// the aggregate is staged in full before anything becomes visible, and UID
/// uniqueness is checked under the same write lock that inserts. It also
/// exposes hooks to count calls and to inject failures and latency.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    tables: Arc<RwLock<Tables>>,
    hooks: Arc<Hooks>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns how many times `get_by_id` was called.
    pub fn read_count(&self) -> usize {
        self.hooks.reads.load(Ordering::SeqCst)
    }

    /// Returns how many times `create` was called.
    pub fn write_count(&self) -> usize {
        self.hooks.writes.load(Ordering::SeqCst)
    }

    /// Makes every subsequent `create` fail at `stage` until cleared.
    pub fn fail_writes_at(&self, stage: WriteStage) {
        *lock(&self.hooks.fail_at) = Some(stage);
    }

    /// Makes every subsequent `create` be refused at `stage`, as the database
    /// refuses data it cannot hold, until cleared.
    pub fn reject_writes_at(&self, stage: WriteStage) {
        *lock(&self.hooks.reject_at) = Some(stage);
    }

    /// Makes every operation fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.hooks.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delays every operation by `latency` before it touches the tables.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.hooks.latency) = latency;
    }

    /// Removes injected failures and latency.
    pub fn clear_faults(&self) {
        *lock(&self.hooks.fail_at) = None;
        *lock(&self.hooks.reject_at) = None;
        *lock(&self.hooks.latency) = None;
        self.hooks.unavailable.store(false, Ordering::SeqCst);
    }

    /// Clears all orders and counters.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        tables.orders.clear();
        tables.index.clear();
        self.hooks.reads.store(0, Ordering::SeqCst);
        self.hooks.writes.store(0, Ordering::SeqCst);
    }

    async fn simulate_io(&self) -> std::result::Result<(), sqlx::Error> {
        let latency = *lock(&self.hooks.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.hooks.unavailable.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }

    fn check_stage(&self, order_uid: &OrderUid, stage: WriteStage) -> Result<()> {
        if *lock(&self.hooks.fail_at) == Some(stage) {
            return Err(StoreError::Write {
                order_uid: order_uid.clone(),
                stage,
                source: sqlx::Error::Protocol(format!("injected failure at {stage}")),
            });
        }
        if *lock(&self.hooks.reject_at) == Some(stage) {
            return Err(StoreError::Rejected {
                order_uid: order_uid.clone(),
                stage,
                source: sqlx::Error::Protocol(format!("injected rejection at {stage}")),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        self.hooks.writes.fetch_add(1, Ordering::SeqCst);
        let order_uid = &order.order_uid;

        self.simulate_io()
            .await
            .map_err(|source| StoreError::Write {
                order_uid: order_uid.clone(),
                stage: WriteStage::Begin,
                source,
            })?;
        self.check_stage(order_uid, WriteStage::Begin)?;

        let mut tables = self.tables.write().await;

        if tables.index.contains_key(order_uid) {
            return Err(StoreError::AlreadyExists(order_uid.clone()));
        }

        // Walk the same stages as the SQL transaction; nothing is inserted
        // until all of them pass.
        self.check_stage(order_uid, WriteStage::Order)?;
        self.check_stage(order_uid, WriteStage::Delivery)?;
        self.check_stage(order_uid, WriteStage::Payment)?;
        for position in 0..order.items.len() {
            self.check_stage(order_uid, WriteStage::Item(position))?;
        }
        self.check_stage(order_uid, WriteStage::Commit)?;

        let position = tables.orders.len();
        tables.orders.push(order.clone());
        tables.index.insert(order_uid.clone(), position);

        Ok(())
    }

    async fn get_by_id(&self, order_uid: &OrderUid) -> Result<Option<Order>> {
        self.hooks.reads.fetch_add(1, Ordering::SeqCst);
        self.simulate_io().await?;

        let tables = self.tables.read().await;
        Ok(tables
            .index
            .get(order_uid)
            .map(|&position| tables.orders[position].clone()))
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        self.simulate_io().await?;
        Ok(self.tables.read().await.orders.clone())
    }

    async fn list(&self, page: Page) -> Result<Vec<Order>> {
        self.simulate_io().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .skip(page.offset)
            .take(page.limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.simulate_io().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domain::{Delivery, Item, Money, Payment};

    fn create_test_order(uid: &str, prices: &[i64]) -> Order {
        Order {
            order_uid: OrderUid::new(uid),
            track_number: "WBILMTESTTRACK".to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery {
                name: "Test Testov".to_string(),
                city: "Kiryat Mozkin".to_string(),
                ..Default::default()
            },
            payment: Payment {
                transaction: uid.to_string(),
                currency: "USD".to_string(),
                amount: Money::from_minor(prices.iter().sum()),
                ..Default::default()
            },
            items: prices
                .iter()
                .enumerate()
                .map(|(i, &price)| Item {
                    chrt_id: i as i64,
                    price: Money::from_minor(price),
                    total_price: Money::from_minor(price),
                    name: format!("item-{i}"),
                    ..Default::default()
                })
                .collect(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: Utc.with_ymd_and_hms(2021, 11, 26, 6, 22, 19).unwrap(),
            oof_shard: "1".to_string(),
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order("uid-1", &[1000, 1500]);

        store.create(&order).await.unwrap();

        let loaded = store.get_by_id(&order.order_uid).await.unwrap();
        assert_eq!(loaded, Some(order));
        assert_eq!(store.read_count(), 1);
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let store = InMemoryOrderStore::new();
        let loaded = store.get_by_id(&OrderUid::new("nope")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn duplicate_create_reports_already_exists() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order("uid-1", &[1000]);

        store.create(&order).await.unwrap();
        let result = store.create(&order).await;

        assert!(matches!(result, Err(StoreError::AlreadyExists(ref uid)) if uid == &order.order_uid));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn injected_item_failure_leaves_nothing() {
        let store = InMemoryOrderStore::new();
        store.fail_writes_at(WriteStage::Item(1));
        let order = create_test_order("uid-1", &[1000, 1500]);

        let err = store.create(&order).await.unwrap_err();
        assert_eq!(err.stage(), Some(WriteStage::Item(1)));
        assert!(!err.is_rejected());
        assert_eq!(store.order_count().await, 0);
        assert!(store.get_by_id(&order.order_uid).await.unwrap().is_none());

        store.clear_faults();
        store.create(&order).await.unwrap();
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn injected_rejection_is_permanent_and_leaves_nothing() {
        let store = InMemoryOrderStore::new();
        store.reject_writes_at(WriteStage::Payment);
        let order = create_test_order("uid-1", &[1000]);

        let err = store.create(&order).await.unwrap_err();
        assert!(err.is_rejected());
        assert_eq!(err.stage(), Some(WriteStage::Payment));
        assert_eq!(store.order_count().await, 0);

        store.clear_faults();
        store.create(&order).await.unwrap();
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = InMemoryOrderStore::new();
        store.set_unavailable(true);

        let err = store
            .create(&create_test_order("uid-1", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(WriteStage::Begin));
        assert!(store.get_by_id(&OrderUid::new("uid-1")).await.is_err());
        assert!(store.get_all().await.is_err());
        assert!(store.ping().await.is_err());
    }

    #[tokio::test]
    async fn get_all_and_list_keep_insertion_order() {
        let store = InMemoryOrderStore::new();
        assert!(store.get_all().await.unwrap().is_empty());

        for uid in ["a", "b", "c"] {
            store.create(&create_test_order(uid, &[100])).await.unwrap();
        }

        let all: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.order_uid.to_string())
            .collect();
        assert_eq!(all, ["a", "b", "c"]);

        let page = store.list(Page::numbered(2, 2)).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].order_uid.as_str(), "c");
    }

    #[tokio::test]
    async fn concurrent_duplicate_creates_commit_once() {
        let store = InMemoryOrderStore::new();
        let order = create_test_order("uid-1", &[1000, 1500]);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move { store.create(&order).await }));
        }

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => committed += 1,
                Err(e) => assert!(e.is_already_exists()),
            }
        }
        assert_eq!(committed, 1);
        assert_eq!(store.order_count().await, 1);
    }
}
