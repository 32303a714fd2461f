use serde::{Deserialize, Serialize};

use super::Money;

/// Payment transaction attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub transaction: String,
    pub request_id: String,
    pub currency: String,
    pub provider: String,
    pub amount: Money,
    /// Provider timestamp, unix seconds.
    pub payment_dt: i64,
    pub bank: String,
    pub delivery_cost: Money,
    pub goods_total: Money,
    pub custom_fee: Money,
}

impl Payment {
    /// Named monetary fields, in declaration order.
    pub(crate) fn amounts(&self) -> [(&'static str, Money); 4] {
        [
            ("amount", self.amount),
            ("delivery_cost", self.delivery_cost),
            ("goods_total", self.goods_total),
            ("custom_fee", self.custom_fee),
        ]
    }

    /// Text fields with their maximum length in characters.
    pub(crate) fn texts(&self) -> [(&'static str, &str, usize); 5] {
        [
            ("transaction", &self.transaction, 255),
            ("request_id", &self.request_id, 255),
            ("currency", &self.currency, 16),
            ("provider", &self.provider, 255),
            ("bank", &self.bank, 255),
        ]
    }
}
