//! OPC-UA Data Bridge Service
//!
//! Bridges two industrial data-acquisition endpoints: a read pump acquires
//! process values from the source endpoint (by periodic batched polling or
//! server-pushed subscription) and publishes materially changed values onto
//! per-measurement change channels; a write pump forwards each published
//! change to the destination endpoint. Supervisors restart either pump after
//! a fixed failover delay, indefinitely.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   classify    ┌─────────────┐  ┌──────────────┐
//! │ Measurements │──────────────►│ PolledPoint │  │MonitoredPoint│
//! └──────────────┘               └──────┬──────┘  └──────┬───────┘
//!                                       │ batched read   │ subscription
//!                                ┌──────▼──────┐  ┌──────▼───────┐
//!                                │  Polling    │  │ Subscription │
//!                                │  Scheduler  │  │  Listener    │
//!                                └──────┬──────┘  └──────┬───────┘
//!                                       │ deadband       │ (unfiltered)
//!                                       ▼                ▼
//!                                ┌────────────────────────────┐
//!                                │  per-measurement channel   │
//!                                └─────────────┬──────────────┘
//!                                              │ batched write
//!                                       ┌──────▼──────┐
//!                                       │ Write Pump  │
//!                                       └─────────────┘
//! ```
//!
//! The session layer (connect, read, write, subscribe) is the `UaClient`
//! trait family from `bridge-session`; the service itself is
//! protocol-agnostic.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod forward;
pub mod monitor;
pub mod points;
pub mod polling;
pub mod pump;
pub mod supervisor;

pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use pump::{PumpState, ReadPump, WritePump};
pub use supervisor::Supervisor;
