//! Subscription listener
//!
//! Installs one session-wide subscription with the bridge's fixed defaults
//! and one monitored item per monitored point, then reacts to the
//! notification stream. Valid pushed samples go straight onto the
//! measurement's change channel; deadband filtering applies only to the
//! polled path. Item-level errors are logged with the node identity;
//! termination of the subscription, from the server or from a closed
//! stream, is fatal and propagates to the pump.

use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bridge_session::{
    MonitorParams, MonitoredItemId, SubscriptionEvent, SubscriptionParams, UaSession,
    UaSubscription,
};

use crate::error::{BridgeError, Result};
use crate::points::MonitoredPoint;

pub struct SubscriptionListener {
    points: Vec<MonitoredPoint>,
    session: Arc<dyn UaSession>,
}

impl SubscriptionListener {
    pub fn new(points: Vec<MonitoredPoint>, session: Arc<dyn UaSession>) -> Self {
        Self { points, session }
    }

    /// Run until cancelled or the subscription terminates.
    ///
    /// The subscription is created even when no points are monitored, and
    /// then idles on keep-alives; its termination is a failure either way.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let mut subscription = self
            .session
            .subscribe(SubscriptionParams::default())
            .await
            .map_err(|e| BridgeError::monitoring(format!("subscription setup failed: {e}")))?;

        let mut items: HashMap<MonitoredItemId, MonitoredPoint> = HashMap::new();
        for point in self.points {
            let item = subscription
                .monitor(&point.node, MonitorParams::sampling_every(point.resolution_ms))
                .await
                .map_err(|e| {
                    BridgeError::monitoring(format!(
                        "monitored item setup failed for {}: {e}",
                        point.node
                    ))
                })?;
            debug!(node = %point.node, item, "monitored item installed");
            items.insert(item, point);
        }
        info!(items = items.len(), "subscription listener started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                event = subscription.recv() => match event {
                    None => {
                        return Err(BridgeError::monitoring("subscription stream closed"));
                    }
                    Some(SubscriptionEvent::Started { subscription_id }) => {
                        info!(subscription_id, "subscription started");
                    }
                    Some(SubscriptionEvent::KeepAlive) => {}
                    Some(SubscriptionEvent::Changed { item, value }) => {
                        match items.get(&item) {
                            Some(point) => point.ingest(value),
                            None => warn!(item, "change notification for unknown monitored item"),
                        }
                    }
                    Some(SubscriptionEvent::ItemError { item, message }) => {
                        match items.get(&item) {
                            Some(point) => {
                                warn!(node = %point.node, "monitored item error: {message}");
                            }
                            None => warn!(item, "error for unknown monitored item: {message}"),
                        }
                    }
                    Some(SubscriptionEvent::Terminated { reason }) => {
                        return Err(BridgeError::monitoring(format!(
                            "subscription terminated: {reason}"
                        )));
                    }
                },
            }
        }
    }
}
