//! Service configuration
//!
//! Loaded from a TOML document merged with `BRIDGE_`-prefixed environment
//! variables. Endpoint URLs are validated at load time; per-measurement
//! strategy problems (bad poll rate, missing resolution, unknown collection
//! type) are deliberately NOT config errors: they surface when the point
//! registry classifies the measurement list at pump start, where a bad entry
//! is logged and excluded without taking the service down.

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bridge_model::{CollectionType, Deadband, Measurement, NodeRef, ValueKind};

use crate::error::{BridgeError, Result};

fn default_service_name() -> String {
    "bridgesrv".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_failover_timeout() -> u64 {
    5000
}

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    /// Source endpoint (read pump).
    pub input: EndpointConfig,

    /// Destination endpoint (write pump).
    pub output: EndpointConfig,

    /// Delay before a completed pump run cycle is restarted, in milliseconds.
    #[serde(default = "default_failover_timeout")]
    pub failover_timeout: u64,

    #[serde(default)]
    pub measurements: Vec<MeasurementConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Console log level; `RUST_LOG` overrides it.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,
}

/// One measurement entry as written in the config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementConfig {
    pub name: String,
    /// Source node on the input endpoint.
    pub node_in: String,
    /// Destination node on the output endpoint.
    pub node_out: String,
    #[serde(default)]
    pub collection_type: Option<CollectionType>,
    /// Samples per minute, for polled collection.
    #[serde(default)]
    pub poll_rate: Option<u32>,
    /// Sampling interval in milliseconds, for monitored collection.
    #[serde(default)]
    pub monitor_resolution: Option<u64>,
    #[serde(default)]
    pub deadband_absolute: f64,
    #[serde(default)]
    pub deadband_relative: f64,
    #[serde(default)]
    pub data_type: Option<ValueKind>,
}

impl BridgeConfig {
    /// Load from a TOML file, with `BRIDGE_` environment overrides
    /// (`BRIDGE_INPUT__URL`, `BRIDGE_FAILOVER_TIMEOUT`, ...).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: BridgeConfig = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("BRIDGE_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.input.url.trim().is_empty() {
            return Err(BridgeError::config("input endpoint url is empty"));
        }
        if self.output.url.trim().is_empty() {
            return Err(BridgeError::config("output endpoint url is empty"));
        }
        for m in &self.measurements {
            if m.name.trim().is_empty() {
                return Err(BridgeError::config("measurement with empty name"));
            }
            if m.node_in.trim().is_empty() || m.node_out.trim().is_empty() {
                return Err(BridgeError::config(format!(
                    "measurement '{}' is missing a node reference",
                    m.name
                )));
            }
        }
        Ok(())
    }

    pub fn failover_delay(&self) -> Duration {
        Duration::from_millis(self.failover_timeout)
    }

    /// Build the shared measurement descriptors, one change channel each.
    /// Both pumps are constructed over the same list.
    pub fn build_measurements(&self) -> Vec<Arc<Measurement>> {
        self.measurements
            .iter()
            .map(|m| {
                Arc::new(
                    Measurement::build(
                        m.name.clone(),
                        NodeRef::new(&m.node_in),
                        NodeRef::new(&m.node_out),
                    )
                    .collection_type(m.collection_type)
                    .poll_rate(m.poll_rate)
                    .monitor_resolution(m.monitor_resolution)
                    .deadband(Deadband::new(m.deadband_absolute, m.deadband_relative))
                    .data_type(m.data_type)
                    .finish(),
                )
            })
            .collect()
    }
}
