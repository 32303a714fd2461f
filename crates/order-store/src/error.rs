use thiserror::Error;

use crate::OrderUid;

/// Step of the aggregate write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Begin,
    Order,
    Delivery,
    Payment,
    /// Insertion of the item at this position.
    Item(usize),
    Commit,
}

impl std::fmt::Display for WriteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriteStage::Begin => f.write_str("begin"),
            WriteStage::Order => f.write_str("order"),
            WriteStage::Delivery => f.write_str("delivery"),
            WriteStage::Payment => f.write_str("payment"),
            WriteStage::Item(position) => write!(f, "item[{position}]"),
            WriteStage::Commit => f.write_str("commit"),
        }
    }
}

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An order with this UID is already committed.
    #[error("Order already exists: {0}")]
    AlreadyExists(OrderUid),

    /// The write transaction failed and was rolled back.
    #[error("Failed to write order {order_uid} at stage {stage}: {source}")]
    Write {
        order_uid: OrderUid,
        stage: WriteStage,
        source: sqlx::Error,
    },

    /// The database refused the order's data; repeating the write cannot succeed.
    #[error("Order {order_uid} rejected at stage {stage}: {source}")]
    Rejected {
        order_uid: OrderUid,
        stage: WriteStage,
        source: sqlx::Error,
    },

    /// An order row exists without one of its 1:1 child rows.
    #[error("Order {order_uid} has no {missing} row")]
    Integrity {
        order_uid: OrderUid,
        missing: &'static str,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Returns true for the duplicate-key condition.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }

    /// Returns true when the order itself cannot be stored.
    pub fn is_rejected(&self) -> bool {
        matches!(self, StoreError::Rejected { .. })
    }

    /// Returns the failing write stage, if this is a write failure.
    pub fn stage(&self) -> Option<WriteStage> {
        match self {
            StoreError::Write { stage, .. } | StoreError::Rejected { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
