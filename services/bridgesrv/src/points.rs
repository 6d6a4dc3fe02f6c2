//! Point registry
//!
//! Classifies the configured measurements into polled and monitored point
//! descriptors at pump start, and owns the per-point sample ingestion paths.
//! Classification is idempotent and has no side effects beyond logging:
//! entries with a missing or unrecognized collection type, an out-of-range
//! poll rate, or a missing monitor resolution are excluded with a warning
//! and the rest of the list is unaffected.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

use bridge_model::{CollectionType, DataValue, Measurement, NodeRef, Value};

/// A point sampled by the polling scheduler.
pub struct PolledPoint {
    pub node: NodeRef,
    pub measurement: Arc<Measurement>,
    /// Seconds between samples; always a divisor of 60.
    pub poll_interval: u32,
    last_accepted: Mutex<Option<Value>>,
}

impl PolledPoint {
    /// The baseline the next deadband comparison runs against.
    pub fn last_accepted(&self) -> Option<Value> {
        self.last_accepted.lock().clone()
    }

    /// Feed one sample through validation and the deadband evaluator.
    ///
    /// Invalid samples are dropped and leave the baseline untouched.
    /// Suppressed samples also leave the baseline untouched: drift must
    /// exceed the deadband relative to the last *reported* value, not the
    /// last observed one. Only accepted samples are published and become
    /// the new baseline.
    pub fn ingest(&self, sample: DataValue) {
        self.measurement.attach_data_value(sample.clone());
        let Some(value) = sample.valid_value().cloned() else {
            warn!(
                measurement = %self.measurement.name,
                node = %self.node,
                status = sample.status.name(),
                "dropping invalid polled sample"
            );
            return;
        };

        let mut last = self.last_accepted.lock();
        if self.measurement.deadband.should_emit(last.as_ref(), &value) {
            self.measurement.channel.publish(sample);
            *last = Some(value);
        } else {
            debug!(
                measurement = %self.measurement.name,
                node = %self.node,
                "sample within deadband, suppressed"
            );
        }
    }
}

/// A point observed via server-pushed subscription.
pub struct MonitoredPoint {
    pub node: NodeRef,
    pub measurement: Arc<Measurement>,
    /// Sampling interval hint handed to the subscription, in milliseconds.
    pub resolution_ms: u64,
    last_accepted: Mutex<Option<Value>>,
}

impl MonitoredPoint {
    pub fn last_accepted(&self) -> Option<Value> {
        self.last_accepted.lock().clone()
    }

    /// Feed one pushed notification through validation and onto the channel.
    ///
    /// Server-pushed samples are forwarded as-is; deadband filtering applies
    /// only to the polled path.
    pub fn ingest(&self, sample: DataValue) {
        self.measurement.attach_data_value(sample.clone());
        let Some(value) = sample.valid_value().cloned() else {
            warn!(
                measurement = %self.measurement.name,
                node = %self.node,
                status = sample.status.name(),
                "dropping invalid monitored sample"
            );
            return;
        };
        *self.last_accepted.lock() = Some(value);
        self.measurement.channel.publish(sample);
    }
}

/// A destination point the write pump forwards changes to.
pub struct WritePoint {
    pub node: NodeRef,
    pub measurement: Arc<Measurement>,
    value: Mutex<Option<DataValue>>,
}

impl WritePoint {
    pub fn stage(&self, sample: DataValue) {
        *self.value.lock() = Some(sample);
    }

    pub fn staged(&self) -> Option<DataValue> {
        self.value.lock().clone()
    }
}

/// Split the measurement list into polled and monitored descriptors.
pub fn classify(
    measurements: &[Arc<Measurement>],
) -> (Vec<PolledPoint>, Vec<MonitoredPoint>) {
    let mut polled = Vec::new();
    let mut monitored = Vec::new();

    for m in measurements {
        match m.collection_type {
            Some(CollectionType::Polled) => match m.poll_rate.and_then(poll_interval) {
                Some(interval) => polled.push(PolledPoint {
                    node: m.node_in.clone(),
                    measurement: Arc::clone(m),
                    poll_interval: interval,
                    last_accepted: Mutex::new(None),
                }),
                None => warn!(
                    measurement = %m.name,
                    poll_rate = ?m.poll_rate,
                    "polled measurement has no or invalid poll rate, excluded"
                ),
            },
            Some(CollectionType::Monitored) => match m.monitor_resolution {
                Some(resolution_ms) => monitored.push(MonitoredPoint {
                    node: m.node_in.clone(),
                    measurement: Arc::clone(m),
                    resolution_ms,
                    last_accepted: Mutex::new(None),
                }),
                None => warn!(
                    measurement = %m.name,
                    "monitored measurement has no monitor resolution, excluded"
                ),
            },
            Some(CollectionType::Unrecognized) => warn!(
                measurement = %m.name,
                "unrecognized collection type, excluded"
            ),
            None => warn!(
                measurement = %m.name,
                "no collection type configured, excluded"
            ),
        }
    }

    (polled, monitored)
}

/// One write point per measurement, regardless of collection strategy.
pub fn write_points(measurements: &[Arc<Measurement>]) -> Vec<WritePoint> {
    measurements
        .iter()
        .map(|m| WritePoint {
            node: m.node_out.clone(),
            measurement: Arc::clone(m),
            value: Mutex::new(None),
        })
        .collect()
}

/// The polling interval for a rate in samples/minute: the smallest integer
/// ≥ `round(60 / rate)` that evenly divides 60, so every point fires on a
/// fixed set of wall-clock seconds. Rates outside `[1, 60]` are rejected.
pub fn poll_interval(poll_rate: u32) -> Option<u32> {
    if !(1..=60).contains(&poll_rate) {
        return None;
    }
    let mut interval = ((60.0 / poll_rate as f64).round() as u32).max(1);
    while 60 % interval != 0 {
        interval += 1;
    }
    Some(interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_model::Deadband;

    fn polled_measurement(name: &str, poll_rate: u32, deadband: Deadband) -> Arc<Measurement> {
        Arc::new(
            Measurement::build(name, NodeRef::new(format!("in.{name}")), NodeRef::new(format!("out.{name}")))
                .polled(poll_rate)
                .deadband(deadband)
                .finish(),
        )
    }

    #[test]
    fn interval_table() {
        assert_eq!(poll_interval(60), Some(1));
        assert_eq!(poll_interval(30), Some(2));
        assert_eq!(poll_interval(12), Some(5));
        // round(60/7) = 9, which does not divide 60; the next divisor is 10.
        assert_eq!(poll_interval(7), Some(10));
        assert_eq!(poll_interval(1), Some(60));
        assert_eq!(poll_interval(0), None);
        assert_eq!(poll_interval(61), None);
    }

    #[test]
    fn classify_splits_and_excludes() {
        let measurements = vec![
            polled_measurement("ok-polled", 60, Deadband::default()),
            polled_measurement("bad-rate", 0, Deadband::default()),
            Arc::new(
                Measurement::build("ok-monitored", "in.m".into(), "out.m".into())
                    .monitored(250)
                    .finish(),
            ),
            Arc::new(
                Measurement::build("no-resolution", "in.n".into(), "out.n".into())
                    .collection_type(Some(CollectionType::Monitored))
                    .finish(),
            ),
            Arc::new(
                Measurement::build("no-type", "in.x".into(), "out.x".into()).finish(),
            ),
            Arc::new(
                Measurement::build("odd-type", "in.y".into(), "out.y".into())
                    .collection_type(Some(CollectionType::Unrecognized))
                    .finish(),
            ),
        ];

        let (polled, monitored) = classify(&measurements);
        assert_eq!(polled.len(), 1);
        assert_eq!(polled[0].measurement.name, "ok-polled");
        assert_eq!(polled[0].poll_interval, 1);
        assert_eq!(monitored.len(), 1);
        assert_eq!(monitored[0].measurement.name, "ok-monitored");
        assert_eq!(monitored[0].resolution_ms, 250);
    }

    #[test]
    fn classify_is_idempotent() {
        let measurements = vec![polled_measurement("p", 30, Deadband::default())];
        let (first, _) = classify(&measurements);
        let (second, _) = classify(&measurements);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].poll_interval, second[0].poll_interval);
    }

    #[tokio::test]
    async fn polled_ingest_applies_deadband_and_baseline_rules() {
        let m = polled_measurement("boiler", 60, Deadband::new(0.5, 0.0));
        let (polled, _) = classify(&[Arc::clone(&m)]);
        let point = &polled[0];
        let mut sub = m.channel.subscribe();

        // First sample always passes and becomes the baseline.
        point.ingest(DataValue::good(10.0));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(10.0)));

        // Within the band: suppressed, baseline unchanged.
        point.ingest(DataValue::good(10.2));
        assert_eq!(point.last_accepted(), Some(Value::Number(10.0)));

        // 10.6 clears the band against the *reported* 10.0 even though the
        // previous observation was 10.2.
        point.ingest(DataValue::good(10.6));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(10.6)));
        assert_eq!(point.last_accepted(), Some(Value::Number(10.6)));
    }

    #[tokio::test]
    async fn polled_ingest_drops_invalid_samples() {
        let m = polled_measurement("boiler", 60, Deadband::new(0.5, 0.0));
        let (polled, _) = classify(&[Arc::clone(&m)]);
        let point = &polled[0];

        point.ingest(DataValue::good(10.0));
        point.ingest(DataValue::bad());
        point.ingest(DataValue::good(f64::NAN));
        // Baseline survives the garbage.
        assert_eq!(point.last_accepted(), Some(Value::Number(10.0)));
        // The bad sample is still visible as the latest observation.
        assert!(!m.data_value().unwrap().is_valid());
    }

    #[tokio::test]
    async fn monitored_ingest_forwards_without_deadband() {
        let m = Arc::new(
            Measurement::build("valve", "in.v".into(), "out.v".into())
                .monitored(100)
                .deadband(Deadband::new(100.0, 0.0))
                .finish(),
        );
        let (_, monitored) = classify(&[Arc::clone(&m)]);
        let point = &monitored[0];
        let mut sub = m.channel.subscribe();

        point.ingest(DataValue::good(1.0));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(1.0)));
        // A change far inside the (polled-only) deadband still flows through.
        point.ingest(DataValue::good(1.1));
        assert_eq!(sub.next().await.and_then(|dv| dv.value), Some(Value::Number(1.1)));
    }
}
