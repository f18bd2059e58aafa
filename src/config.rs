//! Monitor configuration.

use crate::error::Result;
use crate::types::ReplayCursor;
use serde::{Deserialize, Serialize};

/// Monitor configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Replay position used when a subscribe request doesn't name one.
    pub default_replay: ReplayCursor,

    /// Forward every received event to the persistence gateway.
    pub persist_events: bool,

    /// Max queued notifications per listener before it is dropped.
    /// Default: 256
    pub notification_buffer: usize,

    /// Payload tree nodes shallower than this start expanded.
    pub tree_expand_depth: usize,

    /// Keys shown in a collapsed object preview.
    pub preview_key_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_replay: ReplayCursor::Tip,
            persist_events: true,
            notification_buffer: 256,
            tree_expand_depth: 2,
            preview_key_limit: 4,
        }
    }
}

impl MonitorConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
