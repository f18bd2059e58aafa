//! Core types for the event monitor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Kind of pub/sub channel exposed by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChannelCategory {
    Standard,
    ChangeDataCapture,
    Custom,
}

impl ChannelCategory {
    pub const ALL: [ChannelCategory; 3] = [
        ChannelCategory::Standard,
        ChannelCategory::ChangeDataCapture,
        ChannelCategory::Custom,
    ];

    /// Guess the category from a channel path.
    ///
    /// `/data/...` channels carry change-capture events, `/event/Name__e`
    /// channels are custom platform events, everything else is standard.
    pub fn infer(path: &str) -> Self {
        if path.starts_with("/data/") {
            ChannelCategory::ChangeDataCapture
        } else if path.starts_with("/event/") && path.ends_with("__e") {
            ChannelCategory::Custom
        } else {
            ChannelCategory::Standard
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ChannelCategory::Standard => "Standard",
            ChannelCategory::ChangeDataCapture => "Change Data Capture",
            ChannelCategory::Custom => "Custom",
        }
    }
}

/// A discovered channel. Immutable once discovered.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Channel {
    /// Channel path, e.g. `/event/Foo__e`.
    pub path: String,
    pub name: String,
    pub category: ChannelCategory,
}

impl Channel {
    pub fn new(path: impl Into<String>, name: impl Into<String>, category: ChannelCategory) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            category,
        }
    }

    /// Build a channel from a bare path, naming it after the last path
    /// segment and inferring the category.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        let category = ChannelCategory::infer(&path);
        Self {
            path,
            name,
            category,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Where a subscription starts reading from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(into = "i64", from = "i64")]
pub enum ReplayCursor {
    /// Only messages published after subscribing (`-1`).
    #[default]
    Tip,
    /// Everything in the channel's retention window (`-2`).
    All,
    /// Messages after a specific replay id.
    From(i64),
}

impl ReplayCursor {
    pub fn as_i64(self) -> i64 {
        match self {
            ReplayCursor::Tip => -1,
            ReplayCursor::All => -2,
            ReplayCursor::From(id) => id,
        }
    }
}

impl From<i64> for ReplayCursor {
    fn from(value: i64) -> Self {
        match value {
            -1 => ReplayCursor::Tip,
            -2 => ReplayCursor::All,
            id => ReplayCursor::From(id),
        }
    }
}

impl From<ReplayCursor> for i64 {
    fn from(cursor: ReplayCursor) -> Self {
        cursor.as_i64()
    }
}

impl fmt::Display for ReplayCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i64())
    }
}

/// Opaque identity of a buffered live event.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier returned by the persistence gateway for a written log record.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}
