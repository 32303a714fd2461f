use std::time::Duration;

use domain::Order;
use service::{CreateOutcome, ServiceError};
use tokio::sync::watch;

use crate::{
    error::{IngestError, Result},
    handler::OrderHandler,
    retry::{self, RetryPolicy},
};

/// What happened to one message, and whether its offset may be committed.
#[derive(Debug)]
pub enum MessageOutcome {
    /// The order was persisted.
    Stored,
    /// The order was already persisted by an earlier delivery.
    Duplicate,
    /// The message can never be processed; it is dropped.
    Rejected(IngestError),
    /// A transient failure; the message must be delivered again.
    Failed(ServiceError),
}

impl MessageOutcome {
    /// Returns true when the message is finished with and may be acknowledged.
    pub fn should_commit(&self) -> bool {
        !matches!(self, MessageOutcome::Failed(_))
    }

    /// Short name used as the `outcome` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            MessageOutcome::Stored => "stored",
            MessageOutcome::Duplicate => "duplicate",
            MessageOutcome::Rejected(_) => "rejected",
            MessageOutcome::Failed(_) => "failed",
        }
    }
}

/// Decodes a JSON payload into a validated order.
pub fn decode_order(payload: &[u8]) -> Result<Order> {
    let order: Order = serde_json::from_slice(payload)?;
    order.validate()?;
    Ok(order)
}

/// Translation and validation gate between a message source and the order
/// service. Holds no storage state.
pub struct IngestAdapter<H> {
    handler: H,
    deadline: Duration,
}

impl<H: OrderHandler> IngestAdapter<H> {
    /// Creates an adapter that bounds every handler call by `deadline`.
    pub fn new(handler: H, deadline: Duration) -> Self {
        Self { handler, deadline }
    }

    /// Returns the per-message deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Handles one raw message.
    pub async fn handle_message(&self, payload: &[u8]) -> MessageOutcome {
        let outcome = match decode_order(payload) {
            Ok(order) => self.dispatch(order).await,
            Err(e) => {
                tracing::warn!(error = %e, bytes = payload.len(), "dropping undecodable message");
                MessageOutcome::Rejected(e)
            }
        };

        metrics::counter!("orders_ingest_messages_total", "outcome" => outcome.label())
            .increment(1);
        outcome
    }

    async fn dispatch(&self, order: Order) -> MessageOutcome {
        match self.handler.handle_order(order, self.deadline).await {
            Ok(CreateOutcome::Created) => MessageOutcome::Stored,
            Ok(CreateOutcome::Duplicate) => MessageOutcome::Duplicate,
            Err(ServiceError::Validation(e)) => {
                tracing::warn!(error = %e, "dropping invalid order");
                MessageOutcome::Rejected(IngestError::Validation(e))
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(error = %e, "dropping order the store refuses");
                MessageOutcome::Rejected(IngestError::Unprocessable(e))
            }
            Err(e) => MessageOutcome::Failed(e),
        }
    }

    /// Handles one message, retrying transient failures in place.
    ///
    /// Returns the first outcome that may be committed, or `None` if
    /// `shutdown` fired while the message was still failing. In that case the
    /// message must be left unacknowledged.
    pub async fn handle_until_committable(
        &self,
        payload: &[u8],
        policy: &RetryPolicy,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<MessageOutcome> {
        let mut delay = policy.initial_delay;
        let mut attempt = 1u32;

        loop {
            let outcome = self.handle_message(payload).await;
            let MessageOutcome::Failed(error) = &outcome else {
                if attempt > 1 {
                    tracing::info!(attempt, "message processed after retry");
                }
                return Some(outcome);
            };

            tracing::warn!(
                attempt,
                error = %error,
                delay_ms = delay.as_millis() as u64,
                "message processing failed, retrying after delay"
            );

            if !retry::pause(delay, shutdown).await {
                return None;
            }

            delay = policy.next_delay(delay);
            attempt += 1;
        }
    }
}
