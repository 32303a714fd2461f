//! Ingestion adapter for order messages.
//!
//! Turns raw message payloads into validated [`domain::Order`] aggregates,
//! hands them to an [`OrderHandler`] and reports a [`MessageOutcome`] that
//! tells the consumption loop whether the message may be acknowledged.
//!
//! With the `kafka` feature, [`kafka`] provides a consumer loop that commits
//! offsets only for messages that were fully handled.

mod adapter;
pub mod error;
mod handler;
#[cfg(feature = "kafka")]
pub mod kafka;
mod retry;

pub use adapter::{IngestAdapter, MessageOutcome, decode_order};
pub use error::{IngestError, Result};
pub use handler::OrderHandler;
pub use retry::RetryPolicy;
