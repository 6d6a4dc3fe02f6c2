//! Measurement descriptors
//!
//! A [`Measurement`] is one bridged point: where to read it, where to write
//! it, how to collect it, and how much a sample must move to be forwarded.
//! Measurements are built once from configuration, shared between the read
//! and write pumps behind `Arc`, and never mutated after construction apart
//! from the `data_value` slot the read side attaches samples to.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::ChangeChannel;
use crate::deadband::Deadband;
use crate::value::{DataValue, ValueKind};

/// Protocol-level address of one process variable on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(String);

impl NodeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How a measurement's source value is collected.
///
/// Configuration entries with a collection type this enum does not know
/// deserialize to [`CollectionType::Unrecognized`] instead of failing the
/// whole document; the point registry logs and skips them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    /// Sampled by periodic client-initiated batched reads.
    Polled,
    /// Observed via a server-pushed subscription.
    Monitored,
    #[serde(other)]
    Unrecognized,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::Polled => "polled",
            CollectionType::Monitored => "monitored",
            CollectionType::Unrecognized => "unrecognized",
        }
    }
}

/// One bridged point, immutable for the lifetime of the process.
pub struct Measurement {
    pub name: String,
    /// Source node on the input endpoint.
    pub node_in: NodeRef,
    /// Destination node on the output endpoint.
    pub node_out: NodeRef,
    pub collection_type: Option<CollectionType>,
    /// Samples per minute, for polled collection.
    pub poll_rate: Option<u32>,
    /// Subscription sampling interval in milliseconds, for monitored collection.
    pub monitor_resolution: Option<u64>,
    pub deadband: Deadband,
    /// Declared payload type. Informational: surfaced by validation output,
    /// not enforced against samples.
    pub data_type: Option<ValueKind>,
    /// Accepted changes flow through here from the read pump to the write pump.
    pub channel: ChangeChannel,
    /// Most recent sample attached by the read side, accepted or not.
    data_value: Mutex<Option<DataValue>>,
}

impl Measurement {
    pub fn attach_data_value(&self, sample: DataValue) {
        *self.data_value.lock() = Some(sample);
    }

    pub fn data_value(&self) -> Option<DataValue> {
        self.data_value.lock().clone()
    }
}

impl fmt::Debug for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Measurement")
            .field("name", &self.name)
            .field("node_in", &self.node_in)
            .field("node_out", &self.node_out)
            .field("collection_type", &self.collection_type)
            .field("poll_rate", &self.poll_rate)
            .field("monitor_resolution", &self.monitor_resolution)
            .field("deadband", &self.deadband)
            .finish_non_exhaustive()
    }
}

/// Builder-style constructor so callers only spell out what differs from the
/// common case.
pub struct MeasurementBuilder {
    measurement: Measurement,
}

impl Measurement {
    pub fn build(name: impl Into<String>, node_in: NodeRef, node_out: NodeRef) -> MeasurementBuilder {
        MeasurementBuilder {
            measurement: Measurement {
                name: name.into(),
                node_in,
                node_out,
                collection_type: None,
                poll_rate: None,
                monitor_resolution: None,
                deadband: Deadband::default(),
                data_type: None,
                channel: ChangeChannel::new(),
                data_value: Mutex::new(None),
            },
        }
    }
}

impl MeasurementBuilder {
    pub fn polled(mut self, poll_rate: u32) -> Self {
        self.measurement.collection_type = Some(CollectionType::Polled);
        self.measurement.poll_rate = Some(poll_rate);
        self
    }

    pub fn monitored(mut self, resolution_ms: u64) -> Self {
        self.measurement.collection_type = Some(CollectionType::Monitored);
        self.measurement.monitor_resolution = Some(resolution_ms);
        self
    }

    pub fn collection_type(mut self, collection_type: Option<CollectionType>) -> Self {
        self.measurement.collection_type = collection_type;
        self
    }

    pub fn poll_rate(mut self, poll_rate: Option<u32>) -> Self {
        self.measurement.poll_rate = poll_rate;
        self
    }

    pub fn monitor_resolution(mut self, resolution_ms: Option<u64>) -> Self {
        self.measurement.monitor_resolution = resolution_ms;
        self
    }

    pub fn deadband(mut self, deadband: Deadband) -> Self {
        self.measurement.deadband = deadband;
        self
    }

    pub fn data_type(mut self, data_type: Option<ValueKind>) -> Self {
        self.measurement.data_type = data_type;
        self
    }

    pub fn finish(self) -> Measurement {
        self.measurement
    }
}
