//! Deadband evaluation
//!
//! Decides whether a freshly sampled value differs enough from the last
//! reported one to be worth forwarding. The evaluator is pure: it sees only
//! the previous accepted value, the current value, and the thresholds, which
//! keeps it testable without any session or scheduler in place.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Per-measurement deadband thresholds.
///
/// A threshold of `0.0` (the default) disables that check. `absolute` is in
/// engineering units; `relative` is a fraction of the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Deadband {
    #[serde(default)]
    pub absolute: f64,
    #[serde(default)]
    pub relative: f64,
}

impl Deadband {
    pub fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }

    /// Whether `current` should be emitted given the last reported `previous`.
    ///
    /// The first sample of a point (no previous value) is always emitted, as
    /// is any sample whose type differs from the previous one. Numeric
    /// changes must clear the absolute threshold and then the relative one;
    /// booleans are suppressed only when unchanged and an absolute deadband
    /// is configured; strings carry no deadband semantics and always emit.
    pub fn should_emit(&self, previous: Option<&Value>, current: &Value) -> bool {
        let Some(previous) = previous else {
            return true;
        };

        match (previous, current) {
            (Value::Number(prev), Value::Number(curr)) => {
                let delta = (curr - prev).abs();
                if self.absolute > 0.0 && delta < self.absolute {
                    return false;
                }
                if self.relative > 0.0 && delta < prev.abs() * self.relative {
                    return false;
                }
                true
            }
            (Value::Bool(prev), Value::Bool(curr)) => !(self.absolute > 0.0 && prev == curr),
            (Value::Text(_), Value::Text(_)) => true,
            // The payload type changed mid-run; treat it like a first sample.
            _ => true,
        }
    }
}
