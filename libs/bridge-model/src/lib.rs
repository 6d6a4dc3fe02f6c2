//! Domain model for the OPC-UA data bridge
//!
//! This crate contains the types shared between the read side (acquisition)
//! and the write side (forwarding) of the bridge:
//!
//! - [`Value`] / [`DataValue`]: sampled process values and their validity rule
//! - [`Measurement`]: the immutable per-point bridge configuration
//! - [`Deadband`]: the pure change-significance evaluator
//! - [`ChangeChannel`]: the per-measurement hand-off from reader to writer
//!
//! Everything here is protocol-agnostic; session handling lives in
//! `bridge-session` and the pumps live in `bridgesrv`.

pub mod channel;
pub mod deadband;
pub mod measurement;
pub mod value;

pub use channel::{ChangeChannel, ChangeSubscription};
pub use deadband::Deadband;
pub use measurement::{CollectionType, Measurement, NodeRef};
pub use value::{DataValue, Value, ValueKind, ValueStatus};
