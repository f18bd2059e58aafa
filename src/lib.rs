//! # Event Monitor
//!
//! Live monitoring for platform pub/sub channels: subscribe to any set of
//! channels, keep a bounded stream of what arrives on each, and inspect
//! every payload as an expandable tree.
//!
//! ## Core Concepts
//!
//! - **Registry**: One subscription per channel, driven through an injected pub/sub client
//! - **Buffers**: Newest-first, 200 events per channel, patched with persisted record ids
//! - **Trees**: Lazy, per-node expandable views over JSON payloads
//! - **Dashboard**: Pure view model over discovery, subscriptions and buffers
//!
//! ## Example
//!
//! ```ignore
//! use event_monitor::{Channel, MonitorConfig, ReplayCursor, SubscriptionRegistry};
//!
//! let registry = SubscriptionRegistry::new(client, Some(gateway), MonitorConfig::default());
//!
//! registry
//!     .request_subscribe(Channel::from_path("/data/AccountChangeEvent"), ReplayCursor::All)
//!     .await;
//!
//! for event in registry.events("/data/AccountChangeEvent") {
//!     println!("{}", event.payload_tree(Default::default()).render_text());
//! }
//!
//! registry.teardown();
//! ```

pub mod buffer;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod persistence;
pub mod subscriptions;
pub mod tree;
pub mod types;

// Re-exports
pub use buffer::{
    ChangeEventHeader, EnvelopeFields, EventBuffers, EventPatch, LiveBuffer, LiveEvent,
    BUFFER_CAPACITY,
};
pub use config::MonitorConfig;
pub use dashboard::{
    CategoryCount, ChannelFilter, ChannelRow, Dashboard, DashboardView, DiscoveryService, EventRow,
    SelectedChannel,
};
pub use error::{DiscoveryError, MonitorError, PersistenceError, Result, TransportError};
pub use persistence::{LogFields, MemoryLogStore, PersistenceGateway};
pub use subscriptions::{
    ClearSummary, ErrorCallback, ListenerId, MessageCallback, NotificationHandle, PubSubClient,
    RegistryEvent, RequestOutcome, Subscription, SubscriptionRegistry, SubscriptionState,
    TransportHandle,
};
pub use tree::{NodeKind, TreeNode, TreeOptions};
pub use types::*;
