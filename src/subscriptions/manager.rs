//! Subscription registry: channel lifecycle, message intake and notifications.

use crate::buffer::{EventBuffers, EventPatch, LiveEvent};
use crate::config::MonitorConfig;
use crate::error::{self, PersistenceError, TransportError};
use crate::persistence::{LogFields, PersistenceGateway};
use crate::types::{Channel, EventId, ReplayCursor};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::transport::{MessageCallback, PubSubClient, TransportHandle};
use super::types::{
    ListenerId, NotificationHandle, RegistryEvent, RequestOutcome, Subscription, SubscriptionState,
};

/// Internal per-channel state.
struct Slot {
    subscription: Subscription,
    /// Set once the transport confirms the subscribe.
    handle: Option<TransportHandle>,
}

/// What a clear action removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClearSummary {
    pub buffered: usize,
    pub persisted: usize,
}

/// A notification listener's queue.
struct Listener {
    sender: Sender<RegistryEvent>,
    /// Second receiver on the same queue, used to discard the oldest entry.
    backlog: Receiver<RegistryEvent>,
    alive: Weak<()>,
}

impl Listener {
    fn is_closed(&self) -> bool {
        self.alive.strong_count() == 0
    }

    /// Queue a notification without blocking.
    ///
    /// A full queue skips message notices, since the buffer already holds
    /// the event. Lifecycle events push out the oldest queued entry so a
    /// lagging listener still learns about errors.
    fn deliver(&self, id: ListenerId, event: &RegistryEvent) {
        let event = match self.sender.try_send(event.clone()) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => event,
            Err(TrySendError::Disconnected(_)) => return,
        };

        if !event.is_lifecycle() {
            tracing::trace!(listener = id.0, "listener queue full, skipped message notice");
            return;
        }
        let _ = self.backlog.try_recv();
        if self.sender.try_send(event).is_err() {
            tracing::debug!(listener = id.0, "listener queue full, lifecycle event lost");
        } else {
            tracing::debug!(listener = id.0, "listener lagging, discarded oldest notification");
        }
    }
}

/// State shared with transport callbacks and background tasks.
struct Shared {
    slots: RwLock<HashMap<String, Slot>>,
    buffers: Arc<EventBuffers>,
    listeners: RwLock<HashMap<ListenerId, Listener>>,
    next_listener: AtomicU64,
    next_event: AtomicU64,
    persistence: Option<Arc<dyn PersistenceGateway>>,
    runtime: Option<Handle>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    closed: AtomicBool,
    config: MonitorConfig,
}

impl Shared {
    /// Send a notification to every listener. Removes listeners whose
    /// handle is gone.
    fn notify(&self, event: RegistryEvent) {
        let mut to_remove = Vec::new();

        {
            let listeners = self.listeners.read();
            for (id, listener) in listeners.iter() {
                if listener.is_closed() {
                    to_remove.push(*id);
                } else {
                    listener.deliver(*id, &event);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut listeners = self.listeners.write();
            for id in to_remove {
                listeners.remove(&id);
                tracing::debug!(listener = id.0, "removed closed notification listener");
            }
        }
    }

    fn spawn_tracked<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());
        let Some(runtime) = runtime else {
            return false;
        };
        let handle = runtime.spawn(task);
        let mut pending = self.pending.lock();
        pending.retain(|task| !task.is_finished());
        pending.push(handle);
        true
    }

    /// Transport message callback body.
    fn handle_message(&self, channel: &Channel, envelope: Value) {
        if !self.slots.read().contains_key(&channel.path) {
            tracing::debug!(channel = %channel.path, "dropping message for untracked channel");
            return;
        }

        let id = EventId(self.next_event.fetch_add(1, Ordering::SeqCst) + 1);
        let event = LiveEvent::from_envelope(id, channel.clone(), envelope);
        let fields = LogFields::from_event(&event);
        self.buffers.push(&channel.path, event);

        self.notify(RegistryEvent::MessageReceived {
            channel: channel.path.clone(),
            event_id: id,
        });

        if !self.config.persist_events {
            return;
        }
        let Some(gateway) = self.persistence.clone() else {
            return;
        };
        let buffers = Arc::clone(&self.buffers);
        let path = channel.path.clone();
        let spawned = self.spawn_tracked(async move {
            match gateway.create_log(fields).await {
                Ok(record_id) => {
                    buffers.patch(&path, id, &EventPatch::record_id(record_id));
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %path,
                        event_id = %id,
                        error = %e,
                        "failed to persist event"
                    );
                }
            }
        });
        if !spawned {
            tracing::warn!(channel = %channel.path, "no async runtime, event not persisted");
        }
    }

    /// Connection-level error callback body.
    fn handle_transport_error(&self, error: TransportError) {
        tracing::warn!(channel = ?error.channel, error = %error.message, "transport error");
        self.notify(RegistryEvent::SubscribeError {
            channel: error.channel,
            message: error.message,
        });
    }
}

/// Tracks channel subscriptions against a pub/sub client.
///
/// Each channel has at most one subscription. Messages on subscribed
/// channels are buffered newest-first and forwarded to the persistence
/// gateway in the background.
pub struct SubscriptionRegistry {
    client: Arc<dyn PubSubClient>,
    shared: Arc<Shared>,
}

impl SubscriptionRegistry {
    /// Create a registry and register its global error handler with the
    /// client.
    ///
    /// Background work runs on the tokio runtime current at construction,
    /// if any; see [`SubscriptionRegistry::with_runtime`].
    pub fn new(
        client: Arc<dyn PubSubClient>,
        persistence: Option<Arc<dyn PersistenceGateway>>,
        config: MonitorConfig,
    ) -> Self {
        Self::build(client, persistence, config, Handle::try_current().ok())
    }

    /// Create a registry that spawns background work on `runtime`.
    pub fn with_runtime(
        client: Arc<dyn PubSubClient>,
        persistence: Option<Arc<dyn PersistenceGateway>>,
        config: MonitorConfig,
        runtime: Handle,
    ) -> Self {
        Self::build(client, persistence, config, Some(runtime))
    }

    fn build(
        client: Arc<dyn PubSubClient>,
        persistence: Option<Arc<dyn PersistenceGateway>>,
        config: MonitorConfig,
        runtime: Option<Handle>,
    ) -> Self {
        let shared = Arc::new(Shared {
            slots: RwLock::new(HashMap::new()),
            buffers: Arc::new(EventBuffers::new()),
            listeners: RwLock::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
            next_event: AtomicU64::new(0),
            persistence,
            runtime,
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            config,
        });

        let on_error = Arc::clone(&shared);
        client.on_global_error(Arc::new(move |error| on_error.handle_transport_error(error)));

        Self { client, shared }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    // --- Notifications ---

    /// Start listening for notifications.
    pub fn watch(&self) -> NotificationHandle {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.shared.config.notification_buffer.max(1));
        let alive = Arc::new(());
        let listener = Listener {
            sender,
            backlog: receiver.clone(),
            alive: Arc::downgrade(&alive),
        };
        self.shared.listeners.write().insert(id, listener);
        NotificationHandle {
            id,
            receiver,
            alive,
        }
    }

    pub fn unwatch(&self, id: ListenerId) {
        self.shared.listeners.write().remove(&id);
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.read().len()
    }

    // --- Lifecycle ---

    /// Subscribe using the configured default replay cursor.
    pub async fn subscribe(&self, channel: Channel) -> RequestOutcome {
        let replay = self.shared.config.default_replay;
        self.request_subscribe(channel, replay).await
    }

    /// Subscribe to a channel.
    ///
    /// Rejected unless the channel is `Unsubscribed`. Failures return the
    /// channel to `Unsubscribed` and emit `SubscribeError`; nothing is
    /// retried.
    pub async fn request_subscribe(&self, channel: Channel, replay: ReplayCursor) -> RequestOutcome {
        if self.is_closed() {
            return RequestOutcome::Closed;
        }

        {
            let mut slots = self.shared.slots.write();
            if let Some(slot) = slots.get(&channel.path) {
                tracing::debug!(
                    channel = %channel.path,
                    state = ?slot.subscription.state,
                    "subscribe rejected"
                );
                return RequestOutcome::Rejected(slot.subscription.state);
            }
            slots.insert(
                channel.path.clone(),
                Slot {
                    subscription: Subscription {
                        channel: channel.clone(),
                        replay_cursor: replay,
                        state: SubscriptionState::Subscribing,
                    },
                    handle: None,
                },
            );
        }

        let shared = Arc::clone(&self.shared);
        let target = channel.clone();
        let on_message: MessageCallback =
            Arc::new(move |envelope| shared.handle_message(&target, envelope));

        let path = channel.path;
        match self.client.subscribe(&path, replay, on_message).await {
            Ok(handle) => {
                let confirmed = {
                    let mut slots = self.shared.slots.write();
                    if self.is_closed() {
                        slots.remove(&path);
                        false
                    } else if let Some(slot) = slots.get_mut(&path) {
                        slot.subscription.state = SubscriptionState::Subscribed;
                        slot.handle = Some(handle.clone());
                        true
                    } else {
                        false
                    }
                };

                if !confirmed {
                    // Torn down while the subscribe was in flight.
                    if let Err(e) = self.client.unsubscribe(handle).await {
                        tracing::debug!(channel = %path, error = %e, "late unsubscribe failed");
                    }
                    return RequestOutcome::Closed;
                }

                tracing::info!(channel = %path, replay = %replay, "subscribed");
                self.shared.notify(RegistryEvent::Subscribed {
                    channel: path,
                    replay_cursor: replay,
                });
                RequestOutcome::Completed
            }
            Err(e) => {
                self.shared.slots.write().remove(&path);
                tracing::warn!(channel = %path, error = %e.message, "subscribe failed");
                self.shared.notify(RegistryEvent::SubscribeError {
                    channel: Some(path),
                    message: e.message.clone(),
                });
                RequestOutcome::Failed(e.message)
            }
        }
    }

    /// Unsubscribe from a channel.
    ///
    /// Rejected unless the channel is `Subscribed`. Either way the call
    /// ends, the channel returns to `Unsubscribed`; `Unsubscribed` is only
    /// emitted on success. Buffered events are kept.
    pub async fn request_unsubscribe(&self, channel: &str) -> RequestOutcome {
        let handle = {
            let mut slots = self.shared.slots.write();
            let Some(slot) = slots.get_mut(channel) else {
                return RequestOutcome::Rejected(SubscriptionState::Unsubscribed);
            };
            if slot.subscription.state != SubscriptionState::Subscribed {
                return RequestOutcome::Rejected(slot.subscription.state);
            }
            let Some(handle) = slot.handle.clone() else {
                return RequestOutcome::Rejected(slot.subscription.state);
            };
            slot.subscription.state = SubscriptionState::Unsubscribing;
            handle
        };

        let result = self.client.unsubscribe(handle).await;
        self.shared.slots.write().remove(channel);

        match result {
            Ok(()) => {
                tracing::info!(channel, "unsubscribed");
                self.shared.notify(RegistryEvent::Unsubscribed {
                    channel: channel.to_string(),
                });
                RequestOutcome::Completed
            }
            Err(e) => {
                tracing::warn!(channel, error = %e.message, "unsubscribe failed");
                self.shared.notify(RegistryEvent::SubscribeError {
                    channel: Some(channel.to_string()),
                    message: e.message.clone(),
                });
                RequestOutcome::Failed(e.message)
            }
        }
    }

    /// Close every subscription, best effort.
    ///
    /// Unsubscribes for `Subscribed` channels run in the background and
    /// their failures are swallowed. Subscribes still in flight are closed
    /// as soon as the transport confirms them. Further requests return
    /// [`RequestOutcome::Closed`]. Returns how many unsubscribes were
    /// started.
    pub fn teardown(&self) -> usize {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return 0;
        }

        let handles: Vec<TransportHandle> = {
            let mut slots = self.shared.slots.write();
            let subscribed: Vec<String> = slots
                .iter()
                .filter(|(_, slot)| slot.subscription.state == SubscriptionState::Subscribed)
                .map(|(path, _)| path.clone())
                .collect();
            subscribed
                .into_iter()
                .filter_map(|path| slots.remove(&path).and_then(|slot| slot.handle))
                .collect()
        };

        let mut started = 0;
        for handle in handles {
            let client = Arc::clone(&self.client);
            let path = handle.channel().to_string();
            let spawned = self.shared.spawn_tracked(async move {
                if let Err(e) = client.unsubscribe(handle).await {
                    tracing::debug!(channel = %path, error = %e, "teardown unsubscribe failed");
                }
            });
            if spawned {
                started += 1;
            } else {
                tracing::warn!("no async runtime, skipping teardown unsubscribe");
            }
        }

        tracing::info!(unsubscribes = started, "registry torn down");
        started
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Wait for background persistence writes and teardown calls started
    /// so far.
    pub async fn flush_background(&self) {
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.shared.pending.lock());
        for task in tasks {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "background task did not complete");
            }
        }
    }

    // --- Queries ---

    /// Current state of a channel; untracked channels are `Unsubscribed`.
    pub fn state(&self, channel: &str) -> SubscriptionState {
        self.shared
            .slots
            .read()
            .get(channel)
            .map(|slot| slot.subscription.state)
            .unwrap_or_default()
    }

    pub fn subscription(&self, channel: &str) -> Option<Subscription> {
        self.shared
            .slots
            .read()
            .get(channel)
            .map(|slot| slot.subscription.clone())
    }

    /// Every tracked subscription, ordered by channel path.
    pub fn snapshot(&self) -> Vec<Subscription> {
        let mut subscriptions: Vec<Subscription> = self
            .shared
            .slots
            .read()
            .values()
            .map(|slot| slot.subscription.clone())
            .collect();
        subscriptions.sort_by(|a, b| a.channel.path.cmp(&b.channel.path));
        subscriptions
    }

    /// Channels with a confirmed subscription.
    pub fn subscribed_channels(&self) -> Vec<Channel> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.state == SubscriptionState::Subscribed)
            .map(|s| s.channel)
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.slots.read().len()
    }

    pub fn buffers(&self) -> &Arc<EventBuffers> {
        &self.shared.buffers
    }

    /// Buffered events for a channel, newest first.
    pub fn events(&self, channel: &str) -> Vec<Arc<LiveEvent>> {
        self.shared.buffers.snapshot(channel)
    }

    /// Probe the transport.
    pub async fn transport_available(&self) -> bool {
        let available = self.client.is_available().await;
        if !available {
            tracing::warn!("pub/sub transport unavailable");
        }
        available
    }

    // --- Clear actions ---

    /// Drop a channel's buffered events. Persisted logs are untouched.
    pub fn clear_buffer(&self, channel: &str) -> usize {
        let removed = self.shared.buffers.clear(channel);
        tracing::info!(channel, removed, "cleared buffered events");
        removed
    }

    /// Remove a channel's persisted logs. The buffer is untouched.
    pub async fn clear_persisted(&self, channel: &str) -> Result<usize, PersistenceError> {
        let Some(gateway) = self.shared.persistence.clone() else {
            return Ok(0);
        };
        match gateway.clear_log(channel).await {
            Ok(removed) => {
                tracing::info!(channel, removed, "cleared persisted logs");
                Ok(removed)
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "failed to clear persisted logs");
                Err(e)
            }
        }
    }

    /// Clear both the buffer and the persisted logs.
    pub async fn clear_all(&self, channel: &str) -> error::Result<ClearSummary> {
        let buffered = self.clear_buffer(channel);
        let persisted = self.clear_persisted(channel).await?;
        Ok(ClearSummary {
            buffered,
            persisted,
        })
    }
}
