//! Kafka consumer loop.
//!
//! Offsets are committed manually, one message at a time, and only once
//! [`MessageOutcome::should_commit`] allows it. A message that keeps failing
//! blocks its partition until it succeeds or the consumer is shut down, so
//! the broker redelivers it after a restart or rebalance.

use std::time::Duration;

use rdkafka::{
    ClientConfig, Message,
    consumer::{CommitMode, Consumer, StreamConsumer},
};
use tokio::sync::watch;
use tracing::Instrument;

use crate::{
    adapter::IngestAdapter,
    error::Result,
    handler::OrderHandler,
    retry::{self, RetryPolicy},
};

/// Wait after a failed receive before polling the broker again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Connection settings for the order topic.
#[derive(Debug, Clone)]
pub struct KafkaSettings {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

/// Creates a consumer subscribed to the order topic with auto-commit disabled.
pub fn create_consumer(settings: &KafkaSettings) -> Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &settings.brokers)
        .set("group.id", &settings.group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .set("session.timeout.ms", "6000")
        .create()?;

    consumer.subscribe(&[settings.topic.as_str()])?;
    tracing::info!(
        brokers = %settings.brokers,
        topic = %settings.topic,
        group_id = %settings.group_id,
        "Kafka consumer subscribed"
    );
    Ok(consumer)
}

/// Consumes messages until `shutdown` turns true or its sender is dropped.
pub async fn run_consumer<H: OrderHandler>(
    consumer: StreamConsumer,
    adapter: IngestAdapter<H>,
    policy: RetryPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let message = tokio::select! {
            _ = shutdown.changed() => break,
            received = consumer.recv() => match received {
                Ok(message) => message,
                Err(e) => {
                    tracing::error!(error = %e, "Kafka receive failed");
                    if !retry::pause(RECV_ERROR_BACKOFF, &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            },
        };

        let span = tracing::info_span!(
            "message",
            partition = message.partition(),
            offset = message.offset()
        );
        // An empty payload fails decoding and is dropped like any other
        // malformed message.
        let payload = message.payload().unwrap_or_default();
        let outcome = adapter
            .handle_until_committable(payload, &policy, &mut shutdown)
            .instrument(span)
            .await;

        let Some(outcome) = outcome else {
            tracing::info!("shutdown requested, leaving message unacknowledged");
            break;
        };

        if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
            tracing::error!(error = %e, outcome = outcome.label(), "offset commit failed");
        }
    }

    tracing::info!("Kafka consumer stopped");
}
