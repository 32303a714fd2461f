//! Domain error types.

use thiserror::Error;

/// Reasons an order aggregate is rejected before it reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The order has no usable identifier.
    #[error("order_uid is missing or empty")]
    MissingOrderUid,

    /// A payment amount is below zero.
    #[error("payment.{field} must not be negative (got {value})")]
    NegativePaymentAmount { field: &'static str, value: i64 },

    /// An item amount is below zero.
    #[error("items[{index}].{field} must not be negative (got {value})")]
    NegativeItemAmount {
        index: usize,
        field: &'static str,
        value: i64,
    },

    /// An item discount is outside 0..=100 percent.
    #[error("items[{index}].sale must be between 0 and 100 (got {sale})")]
    InvalidSale { index: usize, sale: i32 },

    /// A text field exceeds the length the store can hold.
    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong { field: String, max: usize, len: usize },

    /// A text field contains a NUL character, which the store cannot hold.
    #[error("{field} must not contain NUL characters")]
    ContainsNul { field: String },
}

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
