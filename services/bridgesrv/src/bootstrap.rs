//! Service bootstrap
//!
//! Command-line arguments and logging initialization for the `bridgesrv`
//! binary.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::error::{BridgeError, Result};

/// Command-line arguments for bridgesrv.
#[derive(Parser, Clone, Debug)]
#[command(
    name = "bridgesrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "OPC-UA data bridge",
    long_about = None
)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short = 'c', long, default_value = "config.toml", env = "BRIDGE_CONFIG")]
    pub config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short = 'l', long)]
    pub log_level: Option<String>,

    /// Validate configuration and point classification, then exit
    #[arg(long)]
    pub validate: bool,
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the provided
/// level when set.
pub fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| BridgeError::config(format!("invalid log level '{level}': {e}")))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| BridgeError::internal(format!("failed to init logging: {e}")))?;
    Ok(())
}
