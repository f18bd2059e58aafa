//! Error types for the event monitor.

use thiserror::Error;

/// Failure reported by the pub/sub transport.
///
/// `channel` is set when the failure can be tied to one channel; connection
/// level failures leave it empty.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("transport error{}: {message}", scope_suffix(.channel))]
pub struct TransportError {
    pub channel: Option<String>,
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            channel: None,
            message: message.into(),
        }
    }

    pub fn on_channel(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            message: message.into(),
        }
    }
}

fn scope_suffix(channel: &Option<String>) -> String {
    channel
        .as_ref()
        .map(|c| format!(" on {c}"))
        .unwrap_or_default()
}

/// Failure reported by the persistence gateway.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("persistence error: {0}")]
pub struct PersistenceError(pub String);

/// Failure reported by the discovery service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("discovery error: {0}")]
pub struct DiscoveryError(pub String);

/// Main error type for monitor operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MonitorError {
    fn from(e: serde_json::Error) -> Self {
        MonitorError::Serialization(e.to_string())
    }
}

/// Result type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
