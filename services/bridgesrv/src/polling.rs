//! Polling scheduler
//!
//! Drives the polled points: a tick fires once per second, selects every
//! point whose interval divides the current wall-clock second, and issues
//! one batched read for the selection. Results run through validation and
//! the deadband evaluator in [`PolledPoint::ingest`].
//!
//! Each tick's read-and-filter cycle is spawned, so a slow read does not
//! delay the next tick; overlapping cycles against the same point set are
//! tolerated, with per-point state serialized by the point's own lock. A
//! failed batched read stops the scheduler: the error is funneled back to
//! the tick loop, the recurring tick is dropped, and the failure propagates
//! to the pump.

use chrono::{Timelike, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bridge_session::UaSession;

use crate::error::{BridgeError, Result};
use crate::points::PolledPoint;

/// Scheduler lifecycle, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

pub struct PollingScheduler {
    points: Arc<Vec<PolledPoint>>,
    session: Arc<dyn UaSession>,
    state: Arc<Mutex<SchedulerState>>,
}

impl PollingScheduler {
    pub fn new(points: Vec<PolledPoint>, session: Arc<dyn UaSession>) -> Self {
        Self {
            points: Arc::new(points),
            session,
            state: Arc::new(Mutex::new(SchedulerState::Idle)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Shareable view of the state, for observing after `run` consumed the
    /// scheduler into a task.
    pub fn state_handle(&self) -> Arc<Mutex<SchedulerState>> {
        Arc::clone(&self.state)
    }

    /// Run until cancelled or until a batched read fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        *self.state.lock() = SchedulerState::Running;
        info!(points = self.points.len(), "polling scheduler started");
        let result = self.tick_loop(&shutdown).await;
        *self.state.lock() = SchedulerState::Stopped;
        info!("polling scheduler stopped");
        result
    }

    async fn tick_loop(&self, shutdown: &CancellationToken) -> Result<()> {
        if self.points.is_empty() {
            debug!("no polled points, scheduler idling");
            shutdown.cancelled().await;
            return Ok(());
        }

        // err_tx outlives every spawned cycle; the first error wins and
        // stops the tick.
        let (err_tx, mut err_rx) = mpsc::channel::<BridgeError>(1);
        let mut ticker = interval(Duration::from_secs(1));
        // A stalled runtime should not replay missed seconds.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                Some(err) = err_rx.recv() => return Err(err),
                _ = ticker.tick() => {
                    let second = Utc::now().second();
                    let due: Vec<usize> = self
                        .points
                        .iter()
                        .enumerate()
                        .filter(|(_, p)| second % p.poll_interval == 0)
                        .map(|(i, _)| i)
                        .collect();
                    if !due.is_empty() {
                        tokio::spawn(read_cycle(
                            Arc::clone(&self.session),
                            Arc::clone(&self.points),
                            due,
                            err_tx.clone(),
                        ));
                    }
                }
            }
        }
    }
}

/// One batched read for the points due this tick, plus result filtering.
async fn read_cycle(
    session: Arc<dyn UaSession>,
    points: Arc<Vec<PolledPoint>>,
    due: Vec<usize>,
    err_tx: mpsc::Sender<BridgeError>,
) {
    let nodes: Vec<_> = due.iter().map(|&i| points[i].node.clone()).collect();
    debug!(count = nodes.len(), "issuing batched read");

    match session.read(&nodes).await {
        Ok(values) => {
            if values.len() != due.len() {
                warn!(
                    requested = due.len(),
                    returned = values.len(),
                    "batched read returned unexpected item count"
                );
            }
            for (&i, sample) in due.iter().zip(values) {
                points[i].ingest(sample);
            }
        }
        Err(e) => {
            // Only the first failure matters; later cycles racing in after
            // the scheduler stopped are dropped on the floor.
            let _ = err_tx.try_send(BridgeError::polling(format!("batched read failed: {e}")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::classify;
    use bridge_model::{Deadband, Measurement, NodeRef, Value};
    use bridge_session::sim::SimServer;
    use bridge_session::UaClient;
    use tokio::time::timeout;

    async fn session_for(server: &SimServer) -> Arc<dyn UaSession> {
        let client = server.client();
        client.connect(server.url()).await.unwrap();
        Arc::from(client.create_session().await.unwrap())
    }

    fn polled(name: &str, node: &str, rate: u32) -> Arc<Measurement> {
        Arc::new(
            Measurement::build(name, NodeRef::new(node), NodeRef::new(format!("out.{node}")))
                .polled(rate)
                .deadband(Deadband::new(0.5, 0.0))
                .finish(),
        )
    }

    #[tokio::test]
    async fn idles_without_points_until_cancelled() {
        let server = SimServer::new("sim://sched-empty");
        let scheduler = PollingScheduler::new(Vec::new(), session_for(&server).await);
        let state = scheduler.state_handle();
        assert_eq!(*state.lock(), SchedulerState::Idle);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(*state.lock(), SchedulerState::Running);

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
        assert_eq!(*state.lock(), SchedulerState::Stopped);
    }

    #[tokio::test]
    async fn polls_and_publishes_accepted_samples() {
        let server = SimServer::new("sim://sched-poll");
        let m = polled("boiler", "boiler.in", 60);
        server.set_value(&m.node_in, 10.0);
        let (points, _) = classify(&[Arc::clone(&m)]);

        let mut sub = m.channel.subscribe();
        let scheduler = PollingScheduler::new(points, session_for(&server).await);
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(scheduler.run(shutdown.clone()));

        // Interval 1 means the first tick already selects the point.
        let first = timeout(Duration::from_secs(3), sub.next())
            .await
            .expect("poll within deadline")
            .unwrap();
        assert_eq!(first.value, Some(Value::Number(10.0)));

        shutdown.cancel();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn read_failure_stops_the_scheduler_with_an_error() {
        let server = SimServer::new("sim://sched-fail");
        let m = polled("boiler", "boiler.in", 60);
        server.set_value(&m.node_in, 10.0);
        server.set_fail_reads(true);
        let (points, _) = classify(&[m]);

        let scheduler = PollingScheduler::new(points, session_for(&server).await);
        let state = scheduler.state_handle();
        let result = timeout(
            Duration::from_secs(4),
            scheduler.run(CancellationToken::new()),
        )
        .await
        .expect("scheduler should stop on read failure");
        assert!(matches!(result, Err(BridgeError::Polling(_))));
        assert_eq!(*state.lock(), SchedulerState::Stopped);
    }
}
