//! Persistence gateway for received events.
//!
//! Every buffered event is forwarded to a [`PersistenceGateway`] in the
//! background. The gateway's record id is patched back onto the buffer
//! entry; failures are logged and leave the entry without one.

use crate::buffer::LiveEvent;
use crate::error::PersistenceError;
use crate::types::RecordId;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Fields written for one received event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFields {
    pub channel: String,
    pub replay_id: String,
    pub schema: Option<String>,
    pub created_by: Option<String>,
    pub created_date: Option<String>,
    pub entity_name: Option<String>,
    pub change_type: Option<String>,
    /// Payload serialized as JSON text.
    pub payload: String,
}

impl LogFields {
    pub fn from_event(event: &LiveEvent) -> Self {
        let header = event.change_header.as_ref();
        Self {
            channel: event.channel.path.clone(),
            replay_id: event.replay_cursor.clone(),
            schema: event.schema.clone(),
            created_by: event.created_by.clone(),
            created_date: event.created_date.clone(),
            entity_name: header.map(|h| h.entity_name.clone()),
            change_type: header.map(|h| h.change_type.clone()),
            payload: event.payload.to_string(),
        }
    }
}

/// Durable store for event logs.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Write one event log and return its record id.
    async fn create_log(&self, fields: LogFields) -> Result<RecordId, PersistenceError>;

    /// Remove every persisted log for a channel. Returns how many went.
    async fn clear_log(&self, channel: &str) -> Result<usize, PersistenceError>;
}

/// In-process gateway that keeps logs in memory.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    logs: Mutex<Vec<(RecordId, LogFields)>>,
    next_id: AtomicU64,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs for a channel, oldest first.
    pub fn logs_for(&self, channel: &str) -> Vec<(RecordId, LogFields)> {
        self.logs
            .lock()
            .iter()
            .filter(|(_, fields)| fields.channel == channel)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.logs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.lock().is_empty()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryLogStore {
    async fn create_log(&self, fields: LogFields) -> Result<RecordId, PersistenceError> {
        let id = RecordId(format!("log-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1));
        self.logs.lock().push((id.clone(), fields));
        Ok(id)
    }

    async fn clear_log(&self, channel: &str) -> Result<usize, PersistenceError> {
        let mut logs = self.logs.lock();
        let before = logs.len();
        logs.retain(|(_, fields)| fields.channel != channel);
        Ok(before - logs.len())
    }
}
