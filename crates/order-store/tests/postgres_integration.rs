//! PostgreSQL integration tests
//!
//! A single PostgreSQL container is shared by all tests; every test gets its
//! own freshly migrated database so tests can run in parallel. A container
//! runtime is required.
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use domain::{Delivery, Item, Money, Order, Payment};
use order_store::{OrderStore, OrderUid, Page, PostgresOrderStore, StoreError, WriteStage};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    base_url: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            Arc::new(ContainerInfo {
                container,
                base_url: format!("postgres://postgres:postgres@{host}:{port}"),
            })
        })
        .await
        .clone()
}

/// Get a store backed by a fresh, migrated database
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let admin = PgPool::connect(&format!("{}/postgres", info.base_url))
        .await
        .unwrap();
    let db_name = format!("orders_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE DATABASE {db_name}"))
        .execute(&admin)
        .await
        .unwrap();
    admin.close().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&format!("{}/{db_name}", info.base_url))
        .await
        .unwrap();

    sqlx::raw_sql(include_str!(
        "../../../migrations/001_create_orders_tables.sql"
    ))
    .execute(&pool)
    .await
    .unwrap();

    PostgresOrderStore::new(pool)
}

fn create_test_order(uid: &str, prices: &[i64]) -> Order {
    Order {
        order_uid: OrderUid::new(uid),
        track_number: "WBILMTESTTRACK".to_string(),
        entry: "WBIL".to_string(),
        delivery: Delivery {
            name: "Test Testov".to_string(),
            phone: "+9720000000".to_string(),
            zip: "2639809".to_string(),
            city: "Kiryat Mozkin".to_string(),
            address: "Ploshad Mira 15".to_string(),
            region: "Kraiot".to_string(),
            email: "test@gmail.com".to_string(),
        },
        payment: Payment {
            transaction: uid.to_string(),
            request_id: String::new(),
            currency: "USD".to_string(),
            provider: "wbpay".to_string(),
            amount: Money::from_minor(prices.iter().sum::<i64>() + 150),
            payment_dt: 1637907727,
            bank: "alpha".to_string(),
            delivery_cost: Money::from_minor(150),
            goods_total: Money::from_minor(prices.iter().sum()),
            custom_fee: Money::zero(),
        },
        items: prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Item {
                chrt_id: 9934930 + i as i64,
                track_number: "WBILMTESTTRACK".to_string(),
                price: Money::from_minor(price),
                rid: format!("rid-{uid}-{i}"),
                name: format!("Item {i}"),
                sale: 0,
                size: "0".to_string(),
                total_price: Money::from_minor(price),
                nm_id: 2389212,
                brand: "Vivienne Sabo".to_string(),
                status: 202,
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

async fn count_rows(store: &PostgresOrderStore, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
        .fetch_one(store.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn create_and_get_round_trip() {
    let store = get_test_store().await;
    let order = create_test_order("uid-1", &[1000, 1500, 700]);

    store.create(&order).await.unwrap();

    let loaded = store.get_by_id(&order.order_uid).await.unwrap();
    assert_eq!(loaded.as_ref(), Some(&order));
    let prices: Vec<i64> = loaded
        .unwrap()
        .items
        .iter()
        .map(|i| i.price.minor())
        .collect();
    assert_eq!(prices, [1000, 1500, 700]);
}

#[tokio::test]
async fn get_unknown_order_is_none() {
    let store = get_test_store().await;

    let loaded = store.get_by_id(&OrderUid::new("missing")).await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn duplicate_create_reports_already_exists() {
    let store = get_test_store().await;
    let order = create_test_order("uid-dup", &[1000, 1500]);

    store.create(&order).await.unwrap();
    let result = store.create(&order).await;

    assert!(matches!(result, Err(StoreError::AlreadyExists(_))));
    assert_eq!(count_rows(&store, "orders").await, 1);
    assert_eq!(count_rows(&store, "delivery").await, 1);
    assert_eq!(count_rows(&store, "payment").await, 1);
    assert_eq!(count_rows(&store, "items").await, 2);
}

#[tokio::test]
async fn item_failure_rolls_back_whole_aggregate() {
    let store = get_test_store().await;
    // The items table rejects negative prices, so the second item insert fails.
    let order = create_test_order("uid-bad-item", &[1000, -5]);

    let err = store.create(&order).await.unwrap_err();

    assert_eq!(err.stage(), Some(WriteStage::Item(1)));
    assert!(err.is_rejected());
    assert!(store.get_by_id(&order.order_uid).await.unwrap().is_none());
    assert_eq!(count_rows(&store, "orders").await, 0);
    assert_eq!(count_rows(&store, "delivery").await, 0);
    assert_eq!(count_rows(&store, "payment").await, 0);
    assert_eq!(count_rows(&store, "items").await, 0);
}

#[tokio::test]
async fn overlong_currency_is_rejected_at_payment_stage() {
    let store = get_test_store().await;
    let mut order = create_test_order("uid-long-currency", &[1000]);
    order.payment.currency = "USDUSDUSDUSDUSDUSD".to_string();

    let err = store.create(&order).await.unwrap_err();

    assert!(err.is_rejected(), "unexpected error: {err}");
    assert_eq!(err.stage(), Some(WriteStage::Payment));
    assert_eq!(count_rows(&store, "orders").await, 0);
}

#[tokio::test]
async fn nul_character_is_rejected_at_order_stage() {
    let store = get_test_store().await;
    let mut order = create_test_order("uid-nul", &[1000]);
    order.entry = "WB\u{0}IL".to_string();

    let err = store.create(&order).await.unwrap_err();

    assert!(err.is_rejected(), "unexpected error: {err}");
    assert_eq!(err.stage(), Some(WriteStage::Order));
    assert_eq!(count_rows(&store, "orders").await, 0);
}

#[tokio::test]
async fn concurrent_creates_of_same_uid_commit_once() {
    let store = get_test_store().await;
    let order = create_test_order("uid-race", &[1000]);

    let mut handles = Vec::new();
    for _ in 0..6 {
        let store = store.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move { store.create(&order).await }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => committed += 1,
            Err(e) => assert!(e.is_already_exists(), "unexpected error: {e}"),
        }
    }

    assert_eq!(committed, 1);
    assert_eq!(count_rows(&store, "orders").await, 1);
}

#[tokio::test]
async fn get_all_on_empty_store() {
    let store = get_test_store().await;

    assert!(store.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_all_assembles_every_aggregate() {
    let store = get_test_store().await;
    let orders = vec![
        create_test_order("a", &[100, 200]),
        create_test_order("b", &[]),
        create_test_order("c", &[300]),
    ];
    for order in &orders {
        store.create(order).await.unwrap();
    }

    let all = store.get_all().await.unwrap();
    assert_eq!(all, orders);

    let page = store.list(Page::numbered(2, 2)).await.unwrap();
    assert_eq!(page, vec![orders[2].clone()]);

    // An offset past i64::MAX is beyond every row rather than negative.
    let far = store.list(Page::numbered(usize::MAX / 4, 100)).await.unwrap();
    assert!(far.is_empty());
}

#[tokio::test]
async fn missing_delivery_row_is_integrity_error() {
    let store = get_test_store().await;
    let order = create_test_order("uid-broken", &[100]);
    store.create(&order).await.unwrap();

    sqlx::query("DELETE FROM delivery")
        .execute(store.pool())
        .await
        .unwrap();

    let err = store.get_by_id(&order.order_uid).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Integrity {
            missing: "delivery",
            ..
        }
    ));
    assert!(matches!(
        store.get_all().await,
        Err(StoreError::Integrity { .. })
    ));
}

#[tokio::test]
async fn ping_succeeds() {
    let store = get_test_store().await;

    store.ping().await.unwrap();
}
