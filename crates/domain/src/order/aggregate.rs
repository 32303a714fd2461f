//! Order aggregate root.

use chrono::{DateTime, Utc};
use common::OrderUid;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

use super::{Delivery, Item, Money, Payment};

/// Order aggregate: the order row together with its delivery, payment and
/// line items. It is written and read as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_uid: OrderUid,
    pub track_number: String,
    pub entry: String,
    pub delivery: Delivery,
    pub payment: Payment,
    /// Line items in the order they were received.
    pub items: Vec<Item>,
    pub locale: String,
    pub internal_signature: String,
    pub customer_id: String,
    pub delivery_service: String,
    pub shardkey: String,
    pub sm_id: i32,
    pub date_created: DateTime<Utc>,
    pub oof_shard: String,
}

impl Order {
    /// Checks the aggregate before it is handed to storage.
    ///
    /// An order without a usable `order_uid` cannot be keyed anywhere, so it
    /// is always rejected. Monetary fields must be non-negative and discounts
    /// must be a percentage.
    pub fn validate(&self) -> Result<()> {
        if self.order_uid.is_blank() {
            return Err(ValidationError::MissingOrderUid);
        }

        for (field, value) in self.payment.amounts() {
            if value.is_negative() {
                return Err(ValidationError::NegativePaymentAmount {
                    field,
                    value: value.minor(),
                });
            }
        }

        for (index, item) in self.items.iter().enumerate() {
            if item.price.is_negative() {
                return Err(ValidationError::NegativeItemAmount {
                    index,
                    field: "price",
                    value: item.price.minor(),
                });
            }
            if item.total_price.is_negative() {
                return Err(ValidationError::NegativeItemAmount {
                    index,
                    field: "total_price",
                    value: item.total_price.minor(),
                });
            }
            if !(0..=100).contains(&item.sale) {
                return Err(ValidationError::InvalidSale {
                    index,
                    sale: item.sale,
                });
            }
        }

        self.validate_texts()
    }

    /// Checks every text field against the column it is stored in.
    fn validate_texts(&self) -> Result<()> {
        for (field, value, max) in self.texts() {
            check_text(|| field.to_string(), value, max)?;
        }
        for (field, value, max) in self.delivery.texts() {
            check_text(|| format!("delivery.{field}"), value, max)?;
        }
        for (field, value, max) in self.payment.texts() {
            check_text(|| format!("payment.{field}"), value, max)?;
        }
        for (index, item) in self.items.iter().enumerate() {
            for (field, value, max) in item.texts() {
                check_text(|| format!("items[{index}].{field}"), value, max)?;
            }
        }
        Ok(())
    }

    fn texts(&self) -> [(&'static str, &str, usize); 9] {
        [
            ("order_uid", self.order_uid.as_str(), 255),
            ("track_number", &self.track_number, 255),
            ("entry", &self.entry, 255),
            ("locale", &self.locale, 32),
            ("internal_signature", &self.internal_signature, 255),
            ("customer_id", &self.customer_id, 255),
            ("delivery_service", &self.delivery_service, 255),
            ("shardkey", &self.shardkey, 32),
            ("oof_shard", &self.oof_shard, 32),
        ]
    }

    /// Returns the number of line items.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of `total_price` over all items.
    pub fn items_total(&self) -> Money {
        self.items.iter().map(|item| item.total_price).sum()
    }
}

fn check_text(field: impl FnOnce() -> String, value: &str, max: usize) -> Result<()> {
    if value.contains('\0') {
        return Err(ValidationError::ContainsNul { field: field() });
    }
    // Column limits count characters, not bytes.
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong {
            field: field(),
            max,
            len,
        });
    }
    Ok(())
}
