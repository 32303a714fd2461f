//! Service error types.

use std::time::Duration;

use common::OrderUid;
use domain::ValidationError;
use order_store::StoreError;
use thiserror::Error;

/// Errors returned by the order service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The aggregate failed validation and never reached the store.
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// The store failed. Duplicate-key conditions never surface here.
    #[error("Store {operation} failed{}: {source}", describe_uid(.order_uid))]
    Store {
        operation: &'static str,
        order_uid: Option<OrderUid>,
        source: StoreError,
    },

    /// The operation did not finish before the caller's deadline.
    #[error("{operation} of order {order_uid} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        order_uid: OrderUid,
        after: Duration,
    },
}

fn describe_uid(order_uid: &Option<OrderUid>) -> String {
    match order_uid {
        Some(uid) => format!(" for order {uid}"),
        None => String::new(),
    }
}

impl ServiceError {
    pub(crate) fn store(operation: &'static str, order_uid: &OrderUid, source: StoreError) -> Self {
        ServiceError::Store {
            operation,
            order_uid: Some(order_uid.clone()),
            source,
        }
    }

    /// Returns true if repeating the same request may succeed.
    ///
    /// Validation failures and data the store refuses are permanent; other
    /// store failures and timeouts are treated as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Validation(_) => false,
            ServiceError::Store { source, .. } => !source.is_rejected(),
            ServiceError::Timeout { .. } => true,
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
