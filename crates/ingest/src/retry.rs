use std::time::Duration;

use tokio::sync::watch;

/// Exponential backoff between redelivery attempts of a failed message.
///
/// There is no attempt limit: a message that failed transiently must not be
/// acknowledged, so it is retried until it succeeds or the consumer stops.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for the delay between retries
    pub max_delay: Duration,
    /// Growth factor applied after every failed attempt
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Returns the delay to wait after `delay`, capped at `max_delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64)
            .min(self.max_delay)
    }
}

/// Sleeps for `delay` unless `shutdown` fires first.
///
/// Returns false when the caller should stop instead of carrying on: shutdown
/// was already requested, arrived during the wait, or its sender is gone.
pub(crate) async fn pause(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    }
}
