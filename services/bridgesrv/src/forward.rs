//! Write forwarding
//!
//! The write pump's working half: one listener per measurement channel,
//! installed at pump start. Every published change is staged on its write
//! point and sent to the destination endpoint as a single-item batched
//! write. Write problems, per-item bad statuses and failed write calls
//! alike, are logged with the node identity and never retried; they do not
//! end the pump's run cycle.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bridge_session::{UaSession, WriteRequest};

use crate::error::Result;
use crate::points::WritePoint;

pub struct WriteForwarder {
    points: Vec<WritePoint>,
    session: Arc<dyn UaSession>,
}

impl WriteForwarder {
    pub fn new(points: Vec<WritePoint>, session: Arc<dyn UaSession>) -> Self {
        Self { points, session }
    }

    /// Forward until cancelled. Forwarding itself has no fatal outcomes.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        info!(points = self.points.len(), "write forwarding started");
        let mut tasks = Vec::with_capacity(self.points.len());
        for point in self.points {
            tasks.push(tokio::spawn(forward_loop(
                point,
                Arc::clone(&self.session),
                shutdown.clone(),
            )));
        }

        shutdown.cancelled().await;
        let _ = futures::future::join_all(tasks).await;
        info!("write forwarding stopped");
        Ok(())
    }
}

async fn forward_loop(point: WritePoint, session: Arc<dyn UaSession>, shutdown: CancellationToken) {
    let mut changes = point.measurement.channel.subscribe();
    loop {
        let sample = tokio::select! {
            _ = shutdown.cancelled() => return,
            next = changes.next() => match next {
                Some(sample) => sample,
                // Producer side is gone; nothing further will arrive.
                None => return,
            },
        };

        point.stage(sample.clone());
        let request = WriteRequest {
            node: point.node.clone(),
            value: sample,
        };
        debug!(measurement = %point.measurement.name, node = %point.node, "forwarding change");
        match session.write(std::slice::from_ref(&request)).await {
            Ok(statuses) => {
                for status in statuses {
                    if !status.is_good() {
                        warn!(
                            node = %point.node,
                            status = status.name(),
                            "write rejected by destination endpoint"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(node = %point.node, "write failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::write_points;
    use bridge_model::{DataValue, Measurement, NodeRef, Value};
    use bridge_session::sim::SimServer;
    use bridge_session::UaClient;
    use std::time::Duration;
    use tokio::time::timeout;

    fn measurement(name: &str) -> Arc<Measurement> {
        Arc::new(
            Measurement::build(
                name,
                NodeRef::new(format!("in.{name}")),
                NodeRef::new(format!("out.{name}")),
            )
            .polled(60)
            .finish(),
        )
    }

    async fn session_for(server: &SimServer) -> Arc<dyn UaSession> {
        let client = server.client();
        client.connect(server.url()).await.unwrap();
        Arc::from(client.create_session().await.unwrap())
    }

    async fn wait_for_writes(server: &SimServer, count: usize) {
        timeout(Duration::from_secs(1), async {
            while server.written().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("writes should arrive");
    }

    #[tokio::test]
    async fn publish_becomes_exactly_one_write() {
        let server = SimServer::new("sim://fwd-one");
        let m = measurement("boiler");
        let forwarder = WriteForwarder::new(write_points(&[Arc::clone(&m)]), session_for(&server).await);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(forwarder.run(shutdown.clone()));

        // Give the listener a beat to subscribe before publishing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        m.channel.publish(DataValue::good(10.6));
        wait_for_writes(&server, 1).await;

        let written = server.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].node, m.node_out);
        assert_eq!(written[0].value.value, Some(Value::Number(10.6)));

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn rejected_write_does_not_end_the_run() {
        let server = SimServer::new("sim://fwd-reject");
        let m = measurement("sealed");
        server.reject_writes(&m.node_out);
        let forwarder = WriteForwarder::new(write_points(&[Arc::clone(&m)]), session_for(&server).await);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(forwarder.run(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        m.channel.publish(DataValue::good(1.0));
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Nothing landed, nothing crashed; the forwarder is still alive and
        // processes the next change.
        assert!(server.written().is_empty());
        assert!(!task.is_finished());

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }
}
