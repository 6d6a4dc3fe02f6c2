//! Error handling for the bridge service
//!
//! One error type covers the whole service; variants are tagged by the
//! subsystem that raised them so a supervisor log line already tells you
//! which half of a pump fell over.

use thiserror::Error;

use bridge_session::SessionError;

/// Bridge service error type.
#[derive(Error, Debug, Clone)]
pub enum BridgeError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Endpoint connection and session-creation errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Polling sub-task errors (batched read failures)
    #[error("Polling error: {0}")]
    Polling(String),

    /// Monitoring sub-task errors (subscription setup or termination)
    #[error("Monitoring error: {0}")]
    Monitoring(String),

    /// Write-forwarding sub-task errors
    #[error("Forwarding error: {0}")]
    Forwarding(String),

    /// Internal errors (task wiring, join failures)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for the bridge service.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn config(msg: impl Into<String>) -> Self {
        BridgeError::Config(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        BridgeError::Connection(msg.into())
    }

    pub fn polling(msg: impl Into<String>) -> Self {
        BridgeError::Polling(msg.into())
    }

    pub fn monitoring(msg: impl Into<String>) -> Self {
        BridgeError::Monitoring(msg.into())
    }

    pub fn forwarding(msg: impl Into<String>) -> Self {
        BridgeError::Forwarding(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        BridgeError::Internal(msg.into())
    }
}

impl From<SessionError> for BridgeError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Connection(msg) | SessionError::Session(msg) => {
                BridgeError::Connection(msg)
            }
            SessionError::Read(msg) => BridgeError::Polling(msg),
            SessionError::Write(msg) => BridgeError::Forwarding(msg),
            SessionError::Subscription(msg) => BridgeError::Monitoring(msg),
            SessionError::UnsupportedEndpoint(msg) => BridgeError::Config(msg),
        }
    }
}

impl From<figment::Error> for BridgeError {
    fn from(err: figment::Error) -> Self {
        BridgeError::Config(err.to_string())
    }
}
