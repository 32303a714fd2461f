use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Delivery, Item, Money, Order, Payment};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};

use crate::{
    OrderUid, Result, StoreError, WriteStage,
    store::{OrderStore, Page},
};

const UNIQUE_ORDER_UID: &str = "unique_order_uid";

const ORDER_COLUMNS: &str = "id, order_uid, track_number, entry, locale, internal_signature, \
     customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard";

/// Which order rows a read loads.
enum Selection<'a> {
    All,
    One(&'a OrderUid),
    Window { limit: i64, offset: i64 },
}

/// Scalar columns of an order row, before its children are attached.
struct OrderRow {
    id: i64,
    order_uid: OrderUid,
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i32,
    date_created: DateTime<Utc>,
    oof_shard: String,
}

impl OrderRow {
    fn into_order(self, delivery: Delivery, payment: Payment, items: Vec<Item>) -> Order {
        Order {
            order_uid: self.order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// PostgreSQL-backed order store.
///
/// An aggregate spans four tables (`orders`, `delivery`, `payment`, `items`).
/// Writes go through a single transaction; reads run in a read-only
/// repeatable-read transaction so an aggregate is assembled from one snapshot.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Maps a failed insert to a store error.
    ///
    /// The UID constraint means the order is already stored. Other data
    /// exceptions (SQLSTATE class 22) and constraint violations (class 23)
    /// are properties of the order itself, so the write is rejected for good.
    fn write_error(order_uid: &OrderUid, stage: WriteStage, e: sqlx::Error) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = e {
            if db_err.constraint() == Some(UNIQUE_ORDER_UID) {
                return StoreError::AlreadyExists(order_uid.clone());
            }
            if db_err.code().is_some_and(|code| is_data_rejection(&code)) {
                return StoreError::Rejected {
                    order_uid: order_uid.clone(),
                    stage,
                    source: e,
                };
            }
        }
        StoreError::Write {
            order_uid: order_uid.clone(),
            stage,
            source: e,
        }
    }

    async fn insert_aggregate(conn: &mut PgConnection, order: &Order) -> Result<()> {
        let uid = &order.order_uid;

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature,
                                customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(uid.as_str())
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shardkey)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| Self::write_error(uid, WriteStage::Order, e))?;

        let delivery = &order.delivery;
        sqlx::query(
            r#"
            INSERT INTO delivery (order_id, name, phone, zip, city, address, region, email)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order_id)
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .execute(&mut *conn)
        .await
        .map_err(|e| Self::write_error(uid, WriteStage::Delivery, e))?;

        let payment = &order.payment;
        sqlx::query(
            r#"
            INSERT INTO payment (order_id, transaction, request_id, currency, provider, amount,
                                 payment_dt, bank, delivery_cost, goods_total, custom_fee)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order_id)
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount.minor())
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost.minor())
        .bind(payment.goods_total.minor())
        .bind(payment.custom_fee.minor())
        .execute(&mut *conn)
        .await
        .map_err(|e| Self::write_error(uid, WriteStage::Payment, e))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO items (order_id, position, chrt_id, track_number, price, rid, name,
                                   sale, size, total_price, nm_id, brand, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                "#,
            )
            .bind(order_id)
            .bind(position as i32)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price.minor())
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price.minor())
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *conn)
            .await
            .map_err(|e| Self::write_error(uid, WriteStage::Item(position), e))?;
        }

        Ok(())
    }

    /// Loads the selected aggregates from one snapshot.
    async fn load(&self, selection: Selection<'_>) -> Result<Vec<Order>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let rows = match selection {
            Selection::All => {
                sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id"))
                    .fetch_all(&mut *tx)
                    .await?
            }
            Selection::One(order_uid) => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders WHERE order_uid = $1"
                ))
                .bind(order_uid.as_str())
                .fetch_all(&mut *tx)
                .await?
            }
            Selection::Window { limit, offset } => {
                sqlx::query(&format!(
                    "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id LIMIT $1 OFFSET $2"
                ))
                .bind(limit)
                .bind(offset)
                .fetch_all(&mut *tx)
                .await?
            }
        };

        let heads = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if heads.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = heads.iter().map(|h| h.id).collect();

        let mut deliveries: HashMap<i64, Delivery> = sqlx::query(
            r#"
            SELECT order_id, name, phone, zip, city, address, region, email
            FROM delivery
            WHERE order_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Self::row_to_delivery)
        .collect::<Result<_>>()?;

        let mut payments: HashMap<i64, Payment> = sqlx::query(
            r#"
            SELECT order_id, transaction, request_id, currency, provider, amount, payment_dt,
                   bank, delivery_cost, goods_total, custom_fee
            FROM payment
            WHERE order_id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(Self::row_to_payment)
        .collect::<Result<_>>()?;

        let item_rows = sqlx::query(
            r#"
            SELECT order_id, chrt_id, track_number, price, rid, name, sale, size, total_price,
                   nm_id, brand, status
            FROM items
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut items: HashMap<i64, Vec<Item>> = HashMap::new();
        for row in item_rows {
            let (order_id, item) = Self::row_to_item(row)?;
            items.entry(order_id).or_default().push(item);
        }

        heads
            .into_iter()
            .map(|head| {
                let delivery =
                    deliveries
                        .remove(&head.id)
                        .ok_or_else(|| StoreError::Integrity {
                            order_uid: head.order_uid.clone(),
                            missing: "delivery",
                        })?;
                let payment = payments
                    .remove(&head.id)
                    .ok_or_else(|| StoreError::Integrity {
                        order_uid: head.order_uid.clone(),
                        missing: "payment",
                    })?;
                let items = items.remove(&head.id).unwrap_or_default();
                Ok(head.into_order(delivery, payment, items))
            })
            .collect()
    }

    fn row_to_order(row: PgRow) -> Result<OrderRow> {
        Ok(OrderRow {
            id: row.try_get("id")?,
            order_uid: OrderUid::new(row.try_get::<String, _>("order_uid")?),
            track_number: row.try_get("track_number")?,
            entry: row.try_get("entry")?,
            locale: row.try_get("locale")?,
            internal_signature: row.try_get("internal_signature")?,
            customer_id: row.try_get("customer_id")?,
            delivery_service: row.try_get("delivery_service")?,
            shardkey: row.try_get("shardkey")?,
            sm_id: row.try_get("sm_id")?,
            date_created: row.try_get("date_created")?,
            oof_shard: row.try_get("oof_shard")?,
        })
    }

    fn row_to_delivery(row: PgRow) -> Result<(i64, Delivery)> {
        Ok((
            row.try_get("order_id")?,
            Delivery {
                name: row.try_get("name")?,
                phone: row.try_get("phone")?,
                zip: row.try_get("zip")?,
                city: row.try_get("city")?,
                address: row.try_get("address")?,
                region: row.try_get("region")?,
                email: row.try_get("email")?,
            },
        ))
    }

    fn row_to_payment(row: PgRow) -> Result<(i64, Payment)> {
        Ok((
            row.try_get("order_id")?,
            Payment {
                transaction: row.try_get("transaction")?,
                request_id: row.try_get("request_id")?,
                currency: row.try_get("currency")?,
                provider: row.try_get("provider")?,
                amount: Money::from_minor(row.try_get("amount")?),
                payment_dt: row.try_get("payment_dt")?,
                bank: row.try_get("bank")?,
                delivery_cost: Money::from_minor(row.try_get("delivery_cost")?),
                goods_total: Money::from_minor(row.try_get("goods_total")?),
                custom_fee: Money::from_minor(row.try_get("custom_fee")?),
            },
        ))
    }

    fn row_to_item(row: PgRow) -> Result<(i64, Item)> {
        Ok((
            row.try_get("order_id")?,
            Item {
                chrt_id: row.try_get("chrt_id")?,
                track_number: row.try_get("track_number")?,
                price: Money::from_minor(row.try_get("price")?),
                rid: row.try_get("rid")?,
                name: row.try_get("name")?,
                sale: row.try_get("sale")?,
                size: row.try_get("size")?,
                total_price: Money::from_minor(row.try_get("total_price")?),
                nm_id: row.try_get("nm_id")?,
                brand: row.try_get("brand")?,
                status: row.try_get("status")?,
            },
        ))
    }
}

fn is_data_rejection(sqlstate: &str) -> bool {
    sqlstate.starts_with("22") || sqlstate.starts_with("23")
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[tracing::instrument(skip(self, order), fields(order_uid = %order.order_uid))]
    async fn create(&self, order: &Order) -> Result<()> {
        let started = Instant::now();
        let uid = &order.order_uid;

        // Dropping `tx` on any early return rolls the transaction back.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::write_error(uid, WriteStage::Begin, e))?;

        Self::insert_aggregate(&mut *tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| Self::write_error(uid, WriteStage::Commit, e))?;

        metrics::histogram!("orders_store_create_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn get_by_id(&self, order_uid: &OrderUid) -> Result<Option<Order>> {
        Ok(self.load(Selection::One(order_uid)).await?.into_iter().next())
    }

    async fn get_all(&self) -> Result<Vec<Order>> {
        self.load(Selection::All).await
    }

    async fn list(&self, page: Page) -> Result<Vec<Order>> {
        // An offset beyond i64 is past every row the table can hold.
        let Ok(offset) = i64::try_from(page.offset) else {
            return Ok(Vec::new());
        };
        let limit = i64::try_from(page.limit).unwrap_or(i64::MAX);
        self.load(Selection::Window { limit, offset }).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
