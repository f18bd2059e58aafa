//! Channel subscriptions.
//!
//! The [`SubscriptionRegistry`] owns the lifecycle of every channel
//! subscription and mediates calls to the pub/sub transport:
//! - At most one subscription per channel
//! - Lifecycle notifications (`subscribed`, `subscribeError`, `unsubscribed`)
//! - Incoming messages are buffered and persisted in the background
//! - Best-effort teardown of everything still open
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::new(client, Some(gateway), MonitorConfig::default());
//! let notes = registry.watch();
//!
//! registry
//!     .request_subscribe(Channel::from_path("/event/Foo__e"), ReplayCursor::Tip)
//!     .await;
//!
//! for note in notes.drain() {
//!     match note {
//!         RegistryEvent::Subscribed { channel, .. } => println!("live on {channel}"),
//!         RegistryEvent::SubscribeError { message, .. } => eprintln!("{message}"),
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod transport;
mod types;

pub use manager::{ClearSummary, SubscriptionRegistry};
pub use transport::{ErrorCallback, MessageCallback, PubSubClient, TransportHandle};
pub use types::{
    ListenerId, NotificationHandle, RegistryEvent, RequestOutcome, Subscription, SubscriptionState,
};
