//! Test doubles for the transport, persistence and discovery collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use event_monitor::{
    Channel, DiscoveryError, DiscoveryService, ErrorCallback, LogFields, MessageCallback,
    PersistenceError, PersistenceGateway, PubSubClient, RecordId, ReplayCursor, TransportError,
    TransportHandle,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Envelope shaped like the platform's platform-event messages.
pub fn platform_envelope(channel: &str, n: u64) -> Value {
    json!({
        "channel": channel,
        "data": {
            "schema": "dffQ2QLzDNHqwB8_sHMxdA",
            "payload": {
                "Sequence__c": n,
                "Message__c": format!("message {n}"),
                "CreatedById": "005xx000001X8Uz",
                "CreatedDate": "2024-05-01T12:00:00Z"
            },
            "event": {"replayId": 1000 + n}
        }
    })
}

/// Pub/sub transport double.
///
/// Subscribes succeed immediately unless the channel is gated (waits for
/// [`FakeTransport::release`]) or marked to fail.
#[derive(Default)]
pub struct FakeTransport {
    callbacks: Mutex<HashMap<String, MessageCallback>>,
    on_error: Mutex<Option<ErrorCallback>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fail_subscribe: Mutex<HashSet<String>>,
    fail_unsubscribe: Mutex<HashSet<String>>,
    pub subscribe_calls: Mutex<Vec<(String, ReplayCursor)>>,
    pub unsubscribe_calls: Mutex<Vec<String>>,
    next_token: AtomicU64,
    unavailable: AtomicBool,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold subscribes on `channel` until released.
    pub fn gate(&self, channel: &str) {
        self.gates
            .lock()
            .insert(channel.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, channel: &str) {
        if let Some(gate) = self.gates.lock().remove(channel) {
            gate.notify_one();
        }
    }

    pub fn fail_subscribe(&self, channel: &str) {
        self.fail_subscribe.lock().insert(channel.to_string());
    }

    pub fn fail_unsubscribe(&self, channel: &str) {
        self.fail_unsubscribe.lock().insert(channel.to_string());
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Deliver an envelope the way the transport would. Returns false if
    /// nothing is listening on the channel.
    pub fn deliver(&self, channel: &str, envelope: Value) -> bool {
        let callback = self.callbacks.lock().get(channel).cloned();
        match callback {
            Some(callback) => {
                callback(envelope);
                true
            }
            None => false,
        }
    }

    pub fn raise(&self, error: TransportError) {
        let handler = self.on_error.lock().clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    pub fn has_error_handler(&self) -> bool {
        self.on_error.lock().is_some()
    }
}

#[async_trait]
impl PubSubClient for FakeTransport {
    async fn subscribe(
        &self,
        channel: &str,
        replay: ReplayCursor,
        on_message: MessageCallback,
    ) -> Result<TransportHandle, TransportError> {
        self.subscribe_calls
            .lock()
            .push((channel.to_string(), replay));
        self.callbacks
            .lock()
            .insert(channel.to_string(), on_message);

        let gate = self.gates.lock().get(channel).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_subscribe.lock().contains(channel) {
            self.callbacks.lock().remove(channel);
            return Err(TransportError::on_channel(channel, "subscribe denied"));
        }
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        Ok(TransportHandle::new(channel, token))
    }

    async fn unsubscribe(&self, handle: TransportHandle) -> Result<(), TransportError> {
        let channel = handle.channel().to_string();
        self.unsubscribe_calls.lock().push(channel.clone());
        if self.fail_unsubscribe.lock().contains(&channel) {
            return Err(TransportError::on_channel(channel, "unsubscribe timed out"));
        }
        self.callbacks.lock().remove(&channel);
        Ok(())
    }

    fn on_global_error(&self, handler: ErrorCallback) {
        *self.on_error.lock() = Some(handler);
    }

    async fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }
}

/// Persistence double that can fail or hold writes.
pub struct FakeGateway {
    fail: AtomicBool,
    permits: Semaphore,
    next_id: AtomicU64,
    pub created: Mutex<Vec<LogFields>>,
    pub cleared: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            permits: Semaphore::new(Semaphore::MAX_PERMITS),
            next_id: AtomicU64::new(1),
            created: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
        })
    }

    /// Writes block until [`FakeGateway::open`] is called.
    pub fn held() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
            permits: Semaphore::new(0),
            next_id: AtomicU64::new(1),
            created: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
        })
    }

    pub fn open(&self) {
        self.permits.add_permits(10_000);
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PersistenceGateway for FakeGateway {
    async fn create_log(&self, fields: LogFields) -> Result<RecordId, PersistenceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PersistenceError(e.to_string()))?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError("insert failed: storage limit exceeded".into()));
        }
        self.created.lock().push(fields);
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(RecordId(format!("a0B{n:012}")))
    }

    async fn clear_log(&self, channel: &str) -> Result<usize, PersistenceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(PersistenceError("delete failed".into()));
        }
        self.cleared.lock().push(channel.to_string());
        let mut created = self.created.lock();
        let before = created.len();
        created.retain(|f| f.channel != channel);
        Ok(before - created.len())
    }
}

/// Discovery double returning a fixed list, or failing.
pub struct FakeDiscovery {
    pub channels: Mutex<Result<Vec<Channel>, DiscoveryError>>,
}

impl FakeDiscovery {
    pub fn with(channels: Vec<Channel>) -> Self {
        Self {
            channels: Mutex::new(Ok(channels)),
        }
    }

    pub fn fail_with(&self, message: &str) {
        *self.channels.lock() = Err(DiscoveryError(message.to_string()));
    }
}

#[async_trait]
impl DiscoveryService for FakeDiscovery {
    async fn list_channels(&self) -> Result<Vec<Channel>, DiscoveryError> {
        self.channels.lock().clone()
    }
}
