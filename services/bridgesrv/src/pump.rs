//! Read and write pump run cycles
//!
//! A pump owns exactly one session client and composes the working halves
//! over one run cycle: classify points, connect and create the session
//! (fail fast), run the sub-tasks concurrently, and always tear the session
//! down on the way out, whichever path ended the cycle. The session is
//! acquired and released inside the cycle, so no run can leak a connection.
//!
//! Sub-task completion flows through a small mpsc: each sub-task reports its
//! result exactly once, the first report decides the cycle's outcome and
//! cancels the sibling, and the remaining reports are drained before
//! disconnecting. Completing twice is unrepresentable.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use bridge_model::Measurement;
use bridge_session::{UaClient, UaSession};

use crate::error::{BridgeError, Result};
use crate::forward::WriteForwarder;
use crate::monitor::SubscriptionListener;
use crate::points;
use crate::polling::PollingScheduler;

/// Pump lifecycle, observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Disconnected,
    Connecting,
    Running,
    Disconnecting,
    Failed,
}

fn set_state(state: &Mutex<PumpState>, next: PumpState) {
    *state.lock() = next;
}

async fn establish(client: &Arc<dyn UaClient>, url: &str) -> Result<Arc<dyn UaSession>> {
    client
        .connect(url)
        .await
        .map_err(|e| BridgeError::connection(format!("connect to {url} failed: {e}")))?;
    let session = client
        .create_session()
        .await
        .map_err(|e| BridgeError::connection(format!("session creation on {url} failed: {e}")))?;
    Ok(Arc::from(session))
}

async fn close_session(session: &Arc<dyn UaSession>) {
    if let Err(e) = session.close().await {
        warn!("session close failed: {e}");
    }
}

/// Acquires values from the source endpoint by polling and subscription.
pub struct ReadPump {
    url: String,
    client: Arc<dyn UaClient>,
    measurements: Vec<Arc<Measurement>>,
    state: Arc<Mutex<PumpState>>,
}

impl ReadPump {
    pub fn new(
        url: impl Into<String>,
        client: Arc<dyn UaClient>,
        measurements: Vec<Arc<Measurement>>,
    ) -> Self {
        Self {
            url: url.into(),
            client,
            measurements,
            state: Arc::new(Mutex::new(PumpState::Disconnected)),
        }
    }

    pub fn state(&self) -> PumpState {
        *self.state.lock()
    }

    /// One run cycle: ends on sub-task failure or external shutdown, with
    /// the session released either way.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        let (polled, monitored) = points::classify(&self.measurements);
        info!(
            url = %self.url,
            polled = polled.len(),
            monitored = monitored.len(),
            "read pump starting"
        );

        set_state(&self.state, PumpState::Connecting);
        let result = self.connected_cycle(polled, monitored, shutdown).await;
        set_state(&self.state, PumpState::Disconnecting);
        self.client.disconnect().await;
        match &result {
            Ok(()) => set_state(&self.state, PumpState::Disconnected),
            Err(e) => {
                error!(url = %self.url, "read pump run cycle failed: {e}");
                set_state(&self.state, PumpState::Failed);
            }
        }
        result
    }

    async fn connected_cycle(
        &self,
        polled: Vec<points::PolledPoint>,
        monitored: Vec<points::MonitoredPoint>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let session = establish(&self.client, &self.url).await?;
        set_state(&self.state, PumpState::Running);

        let stop = CancellationToken::new();
        let (done_tx, mut done_rx) = mpsc::channel::<(&'static str, Result<()>)>(2);

        let scheduler = PollingScheduler::new(polled, Arc::clone(&session));
        {
            let stop = stop.child_token();
            let done = done_tx.clone();
            tokio::spawn(async move {
                let result = scheduler.run(stop).await;
                let _ = done.send(("polling", result)).await;
            });
        }

        let listener = SubscriptionListener::new(monitored, Arc::clone(&session));
        {
            let stop = stop.child_token();
            let done = done_tx.clone();
            tokio::spawn(async move {
                let result = listener.run(stop).await;
                let _ = done.send(("monitoring", result)).await;
            });
        }
        drop(done_tx);

        // First completion decides the outcome; external shutdown beats both.
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => {
                info!(url = %self.url, "read pump shutting down");
                Ok(())
            }
            done = done_rx.recv() => match done {
                Some((task, result)) => {
                    match &result {
                        Ok(()) => info!(task, "read pump sub-task completed"),
                        Err(e) => warn!(task, "read pump sub-task failed: {e}"),
                    }
                    result
                }
                None => Err(BridgeError::internal("read pump sub-tasks ended without reporting")),
            },
        };

        // Stop the sibling and wait for both to wind down before the
        // session goes away underneath them.
        stop.cancel();
        while let Some((task, result)) = done_rx.recv().await {
            if let Err(e) = result {
                debug!(task, "sub-task ended during teardown: {e}");
            }
        }

        close_session(&session).await;
        outcome
    }
}

/// Forwards published changes to the destination endpoint.
pub struct WritePump {
    url: String,
    client: Arc<dyn UaClient>,
    measurements: Vec<Arc<Measurement>>,
    state: Arc<Mutex<PumpState>>,
}

impl WritePump {
    pub fn new(
        url: impl Into<String>,
        client: Arc<dyn UaClient>,
        measurements: Vec<Arc<Measurement>>,
    ) -> Self {
        Self {
            url: url.into(),
            client,
            measurements,
            state: Arc::new(Mutex::new(PumpState::Disconnected)),
        }
    }

    pub fn state(&self) -> PumpState {
        *self.state.lock()
    }

    /// One run cycle. Forwarding has no fatal outcomes of its own, so the
    /// cycle ends on connection problems or external shutdown.
    pub async fn run(&self, shutdown: &CancellationToken) -> Result<()> {
        let points = points::write_points(&self.measurements);
        info!(url = %self.url, points = points.len(), "write pump starting");

        set_state(&self.state, PumpState::Connecting);
        let result = self.connected_cycle(points, shutdown).await;
        set_state(&self.state, PumpState::Disconnecting);
        self.client.disconnect().await;
        match &result {
            Ok(()) => set_state(&self.state, PumpState::Disconnected),
            Err(e) => {
                error!(url = %self.url, "write pump run cycle failed: {e}");
                set_state(&self.state, PumpState::Failed);
            }
        }
        result
    }

    async fn connected_cycle(
        &self,
        points: Vec<points::WritePoint>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let session = establish(&self.client, &self.url).await?;
        set_state(&self.state, PumpState::Running);

        let forwarder = WriteForwarder::new(points, Arc::clone(&session));
        let outcome = forwarder.run(shutdown.child_token()).await;

        close_session(&session).await;
        if outcome.is_ok() {
            info!(url = %self.url, "write pump shutting down");
        }
        outcome
    }
}
