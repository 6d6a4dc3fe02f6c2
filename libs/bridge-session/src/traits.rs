//! The capability surface the bridge core requires from a session backend
//!
//! Modeled on the OPC-UA client service set: connect + session lifecycle,
//! one-shot batched reads, batched writes with per-item status codes, and
//! subscriptions delivering asynchronous per-item change notifications.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bridge_model::{DataValue, NodeRef};

use crate::error::SessionResult;

/// Handle identifying one monitored item within a subscription.
pub type MonitoredItemId = u32;

/// Session-wide subscription parameters.
///
/// The defaults are the values the bridge installs: 1000 ms publishing
/// interval, lifetime count 10, max keep-alive count 2, at most 20
/// notifications per publish, priority 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionParams {
    pub publishing_interval_ms: u64,
    pub lifetime_count: u32,
    pub max_keep_alive_count: u32,
    pub max_notifications_per_publish: u32,
    pub priority: u8,
}

impl Default for SubscriptionParams {
    fn default() -> Self {
        Self {
            publishing_interval_ms: 1000,
            lifetime_count: 10,
            max_keep_alive_count: 2,
            max_notifications_per_publish: 20,
            priority: 1,
        }
    }
}

/// Which timestamps the server should attach to notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimestampsToReturn {
    Source,
    Server,
    #[default]
    Both,
    Neither,
}

/// Per-item monitoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorParams {
    pub sampling_interval_ms: u64,
    pub discard_oldest: bool,
    pub queue_size: u32,
    pub timestamps: TimestampsToReturn,
}

impl MonitorParams {
    /// Bridge defaults with the given sampling interval: discard-oldest
    /// queueing, queue depth 1000, both timestamps requested.
    pub fn sampling_every(sampling_interval_ms: u64) -> Self {
        Self {
            sampling_interval_ms,
            discard_oldest: true,
            queue_size: 1000,
            timestamps: TimestampsToReturn::Both,
        }
    }
}

/// One item of a batched write.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub node: NodeRef,
    pub value: DataValue,
}

/// Per-item outcome of a batched write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    Good,
    BadNodeIdUnknown,
    BadNotWritable,
    BadTypeMismatch,
    BadInternalError,
}

impl WriteStatus {
    pub fn is_good(&self) -> bool {
        matches!(self, WriteStatus::Good)
    }

    pub fn name(&self) -> &'static str {
        match self {
            WriteStatus::Good => "Good",
            WriteStatus::BadNodeIdUnknown => "BadNodeIdUnknown",
            WriteStatus::BadNotWritable => "BadNotWritable",
            WriteStatus::BadTypeMismatch => "BadTypeMismatch",
            WriteStatus::BadInternalError => "BadInternalError",
        }
    }
}

/// Events delivered on a subscription's notification stream.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent {
    /// The server accepted the subscription.
    Started { subscription_id: u32 },
    /// Publishing interval elapsed with nothing to report.
    KeepAlive,
    /// A monitored item sampled a new value.
    Changed {
        item: MonitoredItemId,
        value: DataValue,
    },
    /// A monitored item reported an item-level error.
    ItemError {
        item: MonitoredItemId,
        message: String,
    },
    /// The server or transport tore the subscription down.
    Terminated { reason: String },
}

/// Exclusive per-pump connection to one endpoint.
#[async_trait]
pub trait UaClient: Send + Sync {
    /// Establish the transport connection to `url`.
    async fn connect(&self, url: &str) -> SessionResult<()>;

    /// Create an authenticated session on the established connection.
    async fn create_session(&self) -> SessionResult<Box<dyn UaSession>>;

    /// Tear the connection down. Idempotent; never fails.
    async fn disconnect(&self);
}

/// An established session: reads, writes, subscriptions.
#[async_trait]
pub trait UaSession: Send + Sync {
    /// One-shot batched read. Returns one sample per requested node, in
    /// request order; a node the endpoint cannot serve yields a bad-status
    /// sample, not an error.
    async fn read(&self, nodes: &[NodeRef]) -> SessionResult<Vec<DataValue>>;

    /// Batched write. Returns one status per item, in request order.
    async fn write(&self, items: &[WriteRequest]) -> SessionResult<Vec<WriteStatus>>;

    /// Create a subscription on this session.
    async fn subscribe(&self, params: SubscriptionParams) -> SessionResult<Box<dyn UaSubscription>>;

    /// Close the session. Idempotent and safe to call when no session state
    /// remains on the server.
    async fn close(&self) -> SessionResult<()>;
}

/// A live subscription. Dropping it releases all monitored items.
#[async_trait]
pub trait UaSubscription: Send {
    /// Install a monitored item for `node` and return its handle.
    async fn monitor(&mut self, node: &NodeRef, params: MonitorParams)
        -> SessionResult<MonitoredItemId>;

    /// Next notification, or `None` once the stream is closed. A closed
    /// stream means the subscription no longer exists and is treated by the
    /// bridge like a termination.
    async fn recv(&mut self) -> Option<SubscriptionEvent>;
}
