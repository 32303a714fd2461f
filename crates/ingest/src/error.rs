//! Ingestion error types.

use domain::ValidationError;
use service::ServiceError;
use thiserror::Error;

/// Reasons a message cannot be turned into an order.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload is not a well-formed order document.
    #[error("Malformed order payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The payload decoded but the order is invalid.
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationError),

    /// The order is well formed but can never be stored.
    #[error("Order cannot be stored: {0}")]
    Unprocessable(#[source] ServiceError),

    /// The message broker client failed.
    #[cfg(feature = "kafka")]
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
