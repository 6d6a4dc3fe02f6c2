//! Per-measurement change channels
//!
//! The hand-off between the read pump (producer) and the write pump
//! (consumer). Delivery is deliberately minimal: only the latest published
//! value is retained, a consumer that lags sees the newest value and nothing
//! in between, and a publish made before the consumer subscribes is lost.
//! There is no backlog and no replay.

use tokio::sync::watch;

use crate::value::DataValue;

/// Single-producer, single-consumer stream of accepted samples for one
/// measurement.
pub struct ChangeChannel {
    tx: watch::Sender<Option<DataValue>>,
}

impl ChangeChannel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publish an accepted sample, replacing whatever the consumer has not
    /// yet observed. Succeeds whether or not a consumer is attached.
    pub fn publish(&self, sample: DataValue) {
        self.tx.send_replace(Some(sample));
    }

    /// Attach the consumer. Values published before this call are not
    /// delivered.
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ChangeChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Consumer end of a [`ChangeChannel`].
pub struct ChangeSubscription {
    rx: watch::Receiver<Option<DataValue>>,
}

impl ChangeSubscription {
    /// The next sample published after the last one observed, or `None` once
    /// the producer side is gone.
    pub async fn next(&mut self) -> Option<DataValue> {
        loop {
            self.rx.changed().await.ok()?;
            if let Some(sample) = self.rx.borrow_and_update().clone() {
                return Some(sample);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::time::Duration;
    use tokio::time::timeout;

    fn num(n: f64) -> DataValue {
        DataValue::good(n)
    }

    #[tokio::test]
    async fn delivers_published_samples_in_order() {
        let channel = ChangeChannel::new();
        let mut sub = channel.subscribe();
        channel.publish(num(1.0));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(1.0)));
        channel.publish(num(2.0));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(2.0)));
    }

    #[tokio::test]
    async fn publish_before_subscribe_is_lost() {
        let channel = ChangeChannel::new();
        channel.publish(num(1.0));
        let mut sub = channel.subscribe();
        assert!(timeout(Duration::from_millis(20), sub.next()).await.is_err());
        channel.publish(num(2.0));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(2.0)));
    }

    #[tokio::test]
    async fn slow_consumer_sees_only_latest() {
        let channel = ChangeChannel::new();
        let mut sub = channel.subscribe();
        channel.publish(num(1.0));
        channel.publish(num(2.0));
        channel.publish(num(3.0));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(3.0)));
        assert!(timeout(Duration::from_millis(20), sub.next()).await.is_err());
    }

    #[tokio::test]
    async fn next_ends_when_producer_dropped() {
        let channel = ChangeChannel::new();
        let mut sub = channel.subscribe();
        drop(channel);
        assert!(sub.next().await.is_none());
    }
}
