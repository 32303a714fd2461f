use serde::{Deserialize, Serialize};

use super::Money;

/// A line item of an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub chrt_id: i64,
    pub track_number: String,
    pub price: Money,
    pub rid: String,
    pub name: String,
    /// Discount in percent.
    pub sale: i32,
    pub size: String,
    /// Price actually charged for the line.
    pub total_price: Money,
    pub nm_id: i64,
    pub brand: String,
    pub status: i32,
}

impl Item {
    /// Returns `price` with `sale` percent taken off.
    ///
    /// Upstream computes `total_price` the same way, but the stored value is
    /// authoritative and is never overwritten with this one.
    pub fn discounted_price(&self) -> Money {
        self.price.percent_off(self.sale)
    }

    /// Text fields with their maximum length in characters.
    pub(crate) fn texts(&self) -> [(&'static str, &str, usize); 5] {
        [
            ("track_number", &self.track_number, 255),
            ("rid", &self.rid, 255),
            ("name", &self.name, 255),
            ("size", &self.size, 64),
            ("brand", &self.brand, 255),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discounted_price_applies_sale() {
        let item = Item {
            price: Money::from_minor(1000),
            sale: 15,
            ..Default::default()
        };
        assert_eq!(item.discounted_price().minor(), 850);
    }

    #[test]
    fn item_deserializes_from_message_shape() {
        let json = serde_json::json!({
            "chrt_id": 9934930,
            "track_number": "WBILMTESTTRACK",
            "price": 453,
            "rid": "ab4219087a764ae0btest",
            "name": "Mascaras",
            "sale": 30,
            "size": "0",
            "total_price": 317,
            "nm_id": 2389212,
            "brand": "Vivienne Sabo",
            "status": 202
        });
        let item: Item = serde_json::from_value(json).unwrap();
        assert_eq!(item.price.minor(), 453);
        assert_eq!(item.discounted_price().minor(), 318);
        assert_eq!(item.total_price.minor(), 317);
    }
}
