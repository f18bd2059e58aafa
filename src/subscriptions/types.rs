//! Subscription types for channel monitoring.

use crate::types::{Channel, EventId, ReplayCursor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Lifecycle of one channel's subscription.
///
/// `Unsubscribed → Subscribing → Subscribed → Unsubscribing → Unsubscribed`.
/// The pending states have no timeout; a hung transport call leaves the
/// channel pending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed,
    Unsubscribing,
}

impl SubscriptionState {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Subscribing | Self::Unsubscribing)
    }

    /// True while the channel is tracked by the registry.
    pub fn is_active(self) -> bool {
        self != Self::Unsubscribed
    }
}

/// Snapshot of a tracked subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subscription {
    pub channel: Channel,
    pub replay_cursor: ReplayCursor,
    pub state: SubscriptionState,
}

/// How a subscribe or unsubscribe request ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The transport call succeeded.
    Completed,
    /// The transport call failed; the channel is back to `Unsubscribed`.
    Failed(String),
    /// The channel wasn't in a state that allows the request.
    Rejected(SubscriptionState),
    /// The registry was torn down.
    Closed,
}

/// Notifications emitted by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RegistryEvent {
    /// Subscribe confirmed by the transport.
    Subscribed {
        channel: String,
        replay_cursor: ReplayCursor,
    },

    /// A transport failure. `channel` is empty for connection-level errors
    /// that apply to every subscription.
    SubscribeError {
        channel: Option<String>,
        message: String,
    },

    /// Unsubscribe confirmed by the transport.
    Unsubscribed {
        channel: String,
    },

    /// A message was buffered.
    MessageReceived {
        channel: String,
        event_id: EventId,
    },
}

impl RegistryEvent {
    /// Subscribe/unsubscribe outcomes and errors, as opposed to per-message
    /// notices.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, RegistryEvent::MessageReceived { .. })
    }
}

/// Unique identifier for a notification listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Handle for receiving registry notifications.
pub struct NotificationHandle {
    pub id: ListenerId,
    /// Channel to receive notifications.
    pub receiver: crossbeam_channel::Receiver<RegistryEvent>,
    /// The registry stops notifying once this is dropped.
    pub(crate) alive: Arc<()>,
}

impl NotificationHandle {
    /// Receive the next notification (blocking).
    pub fn recv(&self) -> Result<RegistryEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a notification (non-blocking).
    pub fn try_recv(&self) -> Result<RegistryEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<RegistryEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Everything queued right now.
    pub fn drain(&self) -> Vec<RegistryEvent> {
        self.receiver.try_iter().collect()
    }
}
