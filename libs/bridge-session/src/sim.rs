//! In-process simulated endpoint
//!
//! A complete [`UaClient`]/[`UaSession`]/[`UaSubscription`] backend that
//! lives inside the process: a node/value map, push notifications to live
//! subscriptions, a log of everything written, and fault injection hooks
//! (connection refusal, read failure, subscription termination) for
//! exercising the pumps' recovery paths.
//!
//! Servers are registered process-wide by URL, so a bridge configured with
//! `sim://` endpoints on both sides shares one address space per URL: the
//! read pump's source and the write pump's destination can be inspected from
//! the same test.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::mpsc;
use tracing::debug;

use bridge_model::{DataValue, NodeRef, Value};

use crate::error::{SessionError, SessionResult};
use crate::traits::{
    MonitorParams, MonitoredItemId, SubscriptionEvent, SubscriptionParams, UaClient, UaSession,
    UaSubscription, WriteRequest, WriteStatus,
};

/// URL scheme served by the simulated backend.
pub const SIM_SCHEME: &str = "sim://";

struct Subscriber {
    subscription_id: u32,
    tx: mpsc::UnboundedSender<SubscriptionEvent>,
    items: Vec<(MonitoredItemId, NodeRef)>,
    next_item: MonitoredItemId,
}

#[derive(Default)]
struct SimState {
    nodes: HashMap<NodeRef, DataValue>,
    written: Vec<WriteRequest>,
    rejected_writes: HashSet<NodeRef>,
    subscribers: Vec<Subscriber>,
}

struct SimServerInner {
    url: String,
    state: Mutex<SimState>,
    fail_connect: AtomicBool,
    fail_reads: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    session_closes: AtomicUsize,
    next_subscription: AtomicU32,
}

/// Handle to one simulated endpoint. Cloning shares the endpoint.
#[derive(Clone)]
pub struct SimServer {
    inner: Arc<SimServerInner>,
}

static REGISTRY: OnceLock<Mutex<HashMap<String, SimServer>>> = OnceLock::new();

impl SimServer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SimServerInner {
                url: url.into(),
                state: Mutex::new(SimState::default()),
                fail_connect: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                session_closes: AtomicUsize::new(0),
                next_subscription: AtomicU32::new(1),
            }),
        }
    }

    /// The process-wide endpoint registered for `url`, created on first use.
    pub fn at(url: &str) -> SimServer {
        let registry = REGISTRY.get_or_init(|| Mutex::new(HashMap::new()));
        registry
            .lock()
            .entry(url.to_string())
            .or_insert_with(|| SimServer::new(url))
            .clone()
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// A client connected (once `connect` is called) to this endpoint.
    pub fn client(&self) -> SimClient {
        SimClient {
            server: Arc::clone(&self.inner),
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Store a good-quality sample and notify every subscription monitoring
    /// the node.
    pub fn set_value(&self, node: &NodeRef, value: impl Into<Value>) {
        self.set_data_value(node, DataValue::good(value));
    }

    pub fn set_data_value(&self, node: &NodeRef, sample: DataValue) {
        let mut state = self.inner.state.lock();
        state.nodes.insert(node.clone(), sample.clone());
        notify_subscribers(&mut state, node, &sample);
    }

    pub fn value(&self, node: &NodeRef) -> Option<DataValue> {
        self.inner.state.lock().nodes.get(node).cloned()
    }

    /// Every write accepted by this endpoint, oldest first.
    pub fn written(&self) -> Vec<WriteRequest> {
        self.inner.state.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.inner.state.lock().written.clear();
    }

    /// Make writes to `node` come back with `BadNotWritable`.
    pub fn reject_writes(&self, node: &NodeRef) {
        self.inner.state.lock().rejected_writes.insert(node.clone());
    }

    /// Refuse subsequent `connect` calls.
    pub fn set_fail_connect(&self, fail: bool) {
        self.inner.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Fail subsequent batched reads.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Push a termination notice to every live subscription and drop them,
    /// as a server-side teardown or network loss would.
    pub fn terminate_subscriptions(&self, reason: &str) {
        let mut state = self.inner.state.lock();
        for sub in state.subscribers.drain(..) {
            let _ = sub.tx.send(SubscriptionEvent::Terminated {
                reason: reason.to_string(),
            });
        }
    }

    pub fn connect_count(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    pub fn session_close_count(&self) -> usize {
        self.inner.session_closes.load(Ordering::SeqCst)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.state.lock().subscribers.len()
    }
}

fn notify_subscribers(state: &mut SimState, node: &NodeRef, sample: &DataValue) {
    for sub in &state.subscribers {
        for (item, monitored) in &sub.items {
            if monitored == node {
                let _ = sub.tx.send(SubscriptionEvent::Changed {
                    item: *item,
                    value: sample.clone(),
                });
            }
        }
    }
}

/// [`UaClient`] backed by a [`SimServer`].
pub struct SimClient {
    server: Arc<SimServerInner>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl UaClient for SimClient {
    async fn connect(&self, url: &str) -> SessionResult<()> {
        if self.server.fail_connect.load(Ordering::SeqCst) {
            return Err(SessionError::connection(format!(
                "endpoint {url} refused connection"
            )));
        }
        self.server.connects.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        debug!(url, "sim endpoint connected");
        Ok(())
    }

    async fn create_session(&self) -> SessionResult<Box<dyn UaSession>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::not_connected());
        }
        Ok(Box::new(SimSession {
            server: Arc::clone(&self.server),
            connected: Arc::clone(&self.connected),
        }))
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.server.disconnects.fetch_add(1, Ordering::SeqCst);
            debug!(url = %self.server.url, "sim endpoint disconnected");
        }
    }
}

struct SimSession {
    server: Arc<SimServerInner>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl UaSession for SimSession {
    async fn read(&self, nodes: &[NodeRef]) -> SessionResult<Vec<DataValue>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::not_connected());
        }
        if self.server.fail_reads.load(Ordering::SeqCst) {
            return Err(SessionError::read("simulated read failure"));
        }
        let state = self.server.state.lock();
        Ok(nodes
            .iter()
            .map(|node| state.nodes.get(node).cloned().unwrap_or_else(DataValue::bad))
            .collect())
    }

    async fn write(&self, items: &[WriteRequest]) -> SessionResult<Vec<WriteStatus>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::not_connected());
        }
        let mut state = self.server.state.lock();
        let mut statuses = Vec::with_capacity(items.len());
        for item in items {
            if state.rejected_writes.contains(&item.node) {
                statuses.push(WriteStatus::BadNotWritable);
                continue;
            }
            state.nodes.insert(item.node.clone(), item.value.clone());
            state.written.push(item.clone());
            notify_subscribers(&mut state, &item.node, &item.value);
            statuses.push(WriteStatus::Good);
        }
        Ok(statuses)
    }

    async fn subscribe(&self, _params: SubscriptionParams) -> SessionResult<Box<dyn UaSubscription>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SessionError::not_connected());
        }
        let subscription_id = self.server.next_subscription.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(SubscriptionEvent::Started { subscription_id });
        self.server.state.lock().subscribers.push(Subscriber {
            subscription_id,
            tx,
            items: Vec::new(),
            next_item: 1,
        });
        Ok(Box::new(SimSubscription {
            server: Arc::clone(&self.server),
            subscription_id,
            rx,
        }))
    }

    async fn close(&self) -> SessionResult<()> {
        // Closing with no remaining server-side state is fine.
        self.server.session_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SimSubscription {
    server: Arc<SimServerInner>,
    subscription_id: u32,
    rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

#[async_trait]
impl UaSubscription for SimSubscription {
    async fn monitor(
        &mut self,
        node: &NodeRef,
        _params: MonitorParams,
    ) -> SessionResult<MonitoredItemId> {
        let mut state = self.server.state.lock();
        let current = state.nodes.get(node).cloned();
        let sub = state
            .subscribers
            .iter_mut()
            .find(|s| s.subscription_id == self.subscription_id)
            .ok_or_else(|| SessionError::subscription("subscription no longer exists"))?;
        let item = sub.next_item;
        sub.next_item += 1;
        sub.items.push((item, node.clone()));
        // As on a real server, a fresh monitored item reports the current
        // value immediately if one exists.
        if let Some(value) = current {
            let _ = sub.tx.send(SubscriptionEvent::Changed { item, value });
        }
        Ok(item)
    }

    async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.rx.recv().await
    }
}

impl Drop for SimSubscription {
    fn drop(&mut self) {
        // Dropping the handle releases all monitored items server-side.
        self.server
            .state
            .lock()
            .subscribers
            .retain(|s| s.subscription_id != self.subscription_id);
    }
}
