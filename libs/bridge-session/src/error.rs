//! Session-layer error type

use thiserror::Error;

/// Errors surfaced by a session backend.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    /// Endpoint connection establishment failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Session creation or teardown failed
    #[error("Session error: {0}")]
    Session(String),

    /// A batched read failed as a whole
    #[error("Read error: {0}")]
    Read(String),

    /// A batched write failed as a whole
    #[error("Write error: {0}")]
    Write(String),

    /// Subscription setup or monitored-item installation failed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// No backend is registered for the endpoint URL
    #[error("Unsupported endpoint: {0}")]
    UnsupportedEndpoint(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

impl SessionError {
    pub fn connection(msg: impl Into<String>) -> Self {
        SessionError::Connection(msg.into())
    }

    pub fn session(msg: impl Into<String>) -> Self {
        SessionError::Session(msg.into())
    }

    pub fn read(msg: impl Into<String>) -> Self {
        SessionError::Read(msg.into())
    }

    pub fn write(msg: impl Into<String>) -> Self {
        SessionError::Write(msg.into())
    }

    pub fn subscription(msg: impl Into<String>) -> Self {
        SessionError::Subscription(msg.into())
    }

    pub fn unsupported_endpoint(msg: impl Into<String>) -> Self {
        SessionError::UnsupportedEndpoint(msg.into())
    }

    pub fn not_connected() -> Self {
        SessionError::Session("no active session".to_string())
    }
}
