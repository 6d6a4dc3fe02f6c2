//! Session abstraction for the OPC-UA data bridge
//!
//! The bridge core never talks to a wire protocol directly. It programs
//! against the trait surface in this crate: a [`UaClient`] that connects and
//! hands out sessions, a [`UaSession`] for batched reads, batched writes,
//! and subscriptions, and a [`UaSubscription`] that streams change
//! notifications for monitored items.
//!
//! The [`sim`] module provides an in-process endpoint implementing the same
//! surface. It backs `sim://` URLs in the service binary and every
//! integration test; a deployment against a real OPC-UA stack implements
//! [`UaClient`] for that stack and plugs it into the pumps unchanged.

pub mod error;
pub mod sim;
pub mod traits;

pub use error::{SessionError, SessionResult};
pub use traits::{
    MonitorParams, MonitoredItemId, SubscriptionEvent, SubscriptionParams, TimestampsToReturn,
    UaClient, UaSession, UaSubscription, WriteRequest, WriteStatus,
};

use std::sync::Arc;

/// Resolve an endpoint URL to a client backend.
///
/// `sim://` URLs map onto the process-wide simulated endpoint registry; any
/// other scheme is rejected, since wire-level OPC-UA transport is provided
/// by the embedding deployment, not this crate.
pub fn client_for(url: &str) -> SessionResult<Arc<dyn UaClient>> {
    if url.starts_with(sim::SIM_SCHEME) {
        return Ok(Arc::new(sim::SimServer::at(url).client()));
    }
    Err(SessionError::unsupported_endpoint(format!(
        "no client backend for '{url}': implement UaClient for your endpoint or use a {}* URL",
        sim::SIM_SCHEME
    )))
}
