//! Pub/sub transport contract.

use crate::error::TransportError;
use crate::types::ReplayCursor;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Called by the transport with each raw envelope for a channel.
pub type MessageCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Called by the transport for failures not tied to a pending call.
pub type ErrorCallback = Arc<dyn Fn(TransportError) + Send + Sync>;

/// Opaque handle for an open transport subscription.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TransportHandle {
    channel: String,
    token: u64,
}

impl TransportHandle {
    pub fn new(channel: impl Into<String>, token: u64) -> Self {
        Self {
            channel: channel.into(),
            token,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}

/// Client for the platform's pub/sub service.
///
/// Constructed once per session and shared with the registry.
#[async_trait]
pub trait PubSubClient: Send + Sync {
    /// Open a subscription. `on_message` may be called at any time until
    /// the subscription is closed.
    async fn subscribe(
        &self,
        channel: &str,
        replay: ReplayCursor,
        on_message: MessageCallback,
    ) -> Result<TransportHandle, TransportError>;

    async fn unsubscribe(&self, handle: TransportHandle) -> Result<(), TransportError>;

    /// Register the connection-level error handler. Called once.
    fn on_global_error(&self, handler: ErrorCallback);

    /// Whether the service can be reached at all.
    async fn is_available(&self) -> bool;
}
