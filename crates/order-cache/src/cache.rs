use std::collections::HashMap;
use std::sync::Arc;

use common::OrderUid;
use domain::Order;
use tokio::sync::RwLock;

/// Outcome of [`OrderCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new key was added.
    Inserted,
    /// The key was present and its snapshot was swapped.
    Replaced,
    /// The cache was full and the key was not present, so nothing changed.
    Rejected,
}

impl Admission {
    /// Returns true if the snapshot is now in the cache.
    pub fn is_cached(&self) -> bool {
        !matches!(self, Admission::Rejected)
    }
}

/// Capacity-bounded cache of order aggregates with admission control.
///
/// Entries are `Arc<Order>` snapshots keyed by the order's own UID, so an
/// entry can never sit under a foreign key. Once a snapshot is published it
/// is shared, never mutated.
///
/// Policy: when the cache holds `capacity` keys, a `put` for a key that is not
/// already cached is rejected and existing entries stay. A `put` for a cached
/// key always replaces it. The count used for this decision is the map's own
/// length, read under the same write guard that inserts.
///
/// Readers share a read guard; `tokio::sync::RwLock` queues writers fairly so
/// a steady stream of readers cannot starve a `put`. Guards are never held
/// across any other await.
#[derive(Clone)]
pub struct OrderCache {
    entries: Arc<RwLock<HashMap<OrderUid, Arc<Order>>>>,
    capacity: usize,
}

impl OrderCache {
    /// Creates an empty cache holding at most `capacity` orders.
    ///
    /// A capacity of zero disables caching: every `put` is rejected.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    /// Returns the configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the cached snapshot for `order_uid`, if any.
    pub async fn get(&self, order_uid: &OrderUid) -> Option<Arc<Order>> {
        let found = self.entries.read().await.get(order_uid).cloned();
        if found.is_some() {
            metrics::counter!("orders_cache_hits_total").increment(1);
        } else {
            metrics::counter!("orders_cache_misses_total").increment(1);
        }
        found
    }

    /// Publishes a snapshot under its own UID, subject to the capacity policy.
    pub async fn put(&self, order: Arc<Order>) -> Admission {
        let mut entries = self.entries.write().await;

        let admission = if let Some(slot) = entries.get_mut(&order.order_uid) {
            *slot = order;
            Admission::Replaced
        } else if entries.len() < self.capacity {
            entries.insert(order.order_uid.clone(), order);
            Admission::Inserted
        } else {
            Admission::Rejected
        };
        let len = entries.len();
        drop(entries);

        match admission {
            Admission::Rejected => {
                metrics::counter!("orders_cache_rejections_total").increment(1);
                tracing::debug!(capacity = self.capacity, "cache full, entry not admitted");
            }
            _ => metrics::gauge!("orders_cache_entries").set(len as f64),
        }
        admission
    }

    /// Returns true if `order_uid` is cached.
    pub async fn contains(&self, order_uid: &OrderUid) -> bool {
        self.entries.read().await.contains_key(order_uid)
    }

    /// Returns the number of cached orders.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{Delivery, Payment};

    fn order(uid: &str, track_number: &str) -> Arc<Order> {
        Arc::new(Order {
            order_uid: OrderUid::new(uid),
            track_number: track_number.to_string(),
            entry: "WBIL".to_string(),
            delivery: Delivery::default(),
            payment: Payment::default(),
            items: Vec::new(),
            locale: "en".to_string(),
            internal_signature: String::new(),
            customer_id: "test".to_string(),
            delivery_service: "meest".to_string(),
            shardkey: "9".to_string(),
            sm_id: 99,
            date_created: Utc::now(),
            oof_shard: "1".to_string(),
        })
    }

    #[tokio::test]
    async fn get_returns_published_snapshot() {
        let cache = OrderCache::with_capacity(4);
        let published = order("uid-1", "T1");

        assert_eq!(cache.put(published.clone()).await, Admission::Inserted);

        let cached = cache.get(&OrderUid::new("uid-1")).await.unwrap();
        assert!(Arc::ptr_eq(&cached, &published));
        assert!(cache.get(&OrderUid::new("uid-2")).await.is_none());
    }

    #[tokio::test]
    async fn keys_always_match_value_uid() {
        let cache = OrderCache::with_capacity(4);
        cache.put(order("uid-1", "T1")).await;
        cache.put(order("uid-2", "T2")).await;

        for uid in ["uid-1", "uid-2"] {
            let key = OrderUid::new(uid);
            assert_eq!(cache.get(&key).await.unwrap().order_uid, key);
        }
    }

    #[tokio::test]
    async fn full_cache_rejects_new_keys_and_keeps_old_ones() {
        let cache = OrderCache::with_capacity(3);

        for i in 0..5 {
            let admission = cache.put(order(&format!("uid-{i}"), "T")).await;
            let expected = if i < 3 {
                Admission::Inserted
            } else {
                Admission::Rejected
            };
            assert_eq!(admission, expected, "put #{i}");
        }

        assert_eq!(cache.len().await, 3);
        for i in 0..3 {
            assert!(cache.contains(&OrderUid::new(format!("uid-{i}"))).await);
        }
        for i in 3..5 {
            assert!(!cache.contains(&OrderUid::new(format!("uid-{i}"))).await);
        }
    }

    #[tokio::test]
    async fn full_cache_still_replaces_existing_key() {
        let cache = OrderCache::with_capacity(2);
        cache.put(order("uid-1", "OLD")).await;
        cache.put(order("uid-2", "T2")).await;

        assert_eq!(cache.put(order("uid-1", "NEW")).await, Admission::Replaced);
        assert_eq!(cache.len().await, 2);
        let cached = cache.get(&OrderUid::new("uid-1")).await.unwrap();
        assert_eq!(cached.track_number, "NEW");
    }

    #[tokio::test]
    async fn zero_capacity_disables_caching() {
        let cache = OrderCache::with_capacity(0);
        assert_eq!(cache.put(order("uid-1", "T")).await, Admission::Rejected);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn repeated_put_of_same_key_is_idempotent() {
        let cache = OrderCache::with_capacity(1);
        let snapshot = order("uid-1", "T");

        assert_eq!(cache.put(snapshot.clone()).await, Admission::Inserted);
        assert_eq!(cache.put(snapshot.clone()).await, Admission::Replaced);
        assert_eq!(cache.len().await, 1);
        assert_eq!(*cache.get(&snapshot.order_uid).await.unwrap(), *snapshot);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_never_exceed_capacity() {
        let cache = OrderCache::with_capacity(10);

        let mut handles = Vec::new();
        for i in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                let uid = format!("uid-{}", i % 25);
                let admission = cache.put(order(&uid, "T")).await;
                let _ = cache.get(&OrderUid::new(uid)).await;
                admission
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == Admission::Inserted {
                inserted += 1;
            }
        }

        assert_eq!(inserted, 10);
        assert_eq!(cache.len().await, 10);
    }
}
