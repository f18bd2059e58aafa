//! Live events and envelope extraction.

use crate::tree::{TreeNode, TreeOptions};
use crate::types::{Channel, EventId, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Header carried by change-capture payloads.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeEventHeader {
    pub entity_name: String,
    /// `CREATE`, `UPDATE`, `DELETE`, `UNDELETE` or a gap marker.
    pub change_type: String,
    pub changed_fields: Vec<String>,
    pub record_ids: Vec<String>,
    pub commit_timestamp: Option<i64>,
    pub commit_user: Option<String>,
}

impl ChangeEventHeader {
    /// Read a header field by field. A field of the wrong type is left
    /// empty without discarding the others. `None` if `value` isn't an
    /// object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let header = value.as_object()?;
        let text = |name: &str| match header.get(name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let list = |name: &str| {
            header
                .get(name)
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        let commit_timestamp = match header.get("commitTimestamp") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };

        Some(Self {
            entity_name: text("entityName").unwrap_or_default(),
            change_type: text("changeType").unwrap_or_default(),
            changed_fields: list("changedFields"),
            record_ids: list("recordIds"),
            commit_timestamp,
            commit_user: text("commitUser"),
        })
    }
}

/// Fields pulled out of a transport envelope.
///
/// Extraction never fails: missing sections become `null` or empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvelopeFields {
    pub payload: Value,
    pub replay_cursor: String,
    pub schema: Option<String>,
    pub created_by: Option<String>,
    pub created_date: Option<String>,
    pub change_header: Option<ChangeEventHeader>,
}

impl EnvelopeFields {
    pub fn extract(envelope: &Value) -> Self {
        let data = envelope.get("data");
        let payload = data
            .and_then(|d| d.get("payload"))
            .cloned()
            .unwrap_or(Value::Null);

        let replay_cursor = match data.and_then(|d| d.pointer("/event/replayId")) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };

        let schema = data
            .and_then(|d| d.get("schema"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let text_field = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_string);
        let created_by = text_field("CreatedById");
        let created_date = text_field("CreatedDate");

        let change_header = payload.get("ChangeEventHeader").and_then(|header| {
            let parsed = ChangeEventHeader::from_value(header);
            if parsed.is_none() {
                tracing::debug!("ignoring change event header that is not an object");
            }
            parsed
        });

        Self {
            payload,
            replay_cursor,
            schema,
            created_by,
            created_date,
            change_header,
        }
    }
}

/// A message received on a subscribed channel.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveEvent {
    pub id: EventId,
    pub channel: Channel,
    pub received_at: Timestamp,
    pub replay_cursor: String,
    pub payload: Value,
    pub raw_envelope: Value,
    pub schema: Option<String>,
    pub created_by: Option<String>,
    pub created_date: Option<String>,
    pub change_header: Option<ChangeEventHeader>,
    /// Set once the persistence gateway acknowledges the write.
    pub persisted_record_id: Option<RecordId>,
}

impl LiveEvent {
    pub fn from_envelope(id: EventId, channel: Channel, envelope: Value) -> Self {
        let fields = EnvelopeFields::extract(&envelope);
        Self {
            id,
            channel,
            received_at: Timestamp::now(),
            replay_cursor: fields.replay_cursor,
            payload: fields.payload,
            raw_envelope: envelope,
            schema: fields.schema,
            created_by: fields.created_by,
            created_date: fields.created_date,
            change_header: fields.change_header,
            persisted_record_id: None,
        }
    }

    /// Fresh payload tree for display.
    pub fn payload_tree(&self, options: TreeOptions) -> TreeNode {
        TreeNode::with_options(Some(self.payload.clone()), 0, options)
    }

    /// Fresh tree over the whole envelope.
    pub fn envelope_tree(&self, options: TreeOptions) -> TreeNode {
        TreeNode::with_options(Some(self.raw_envelope.clone()), 0, options)
    }
}

/// Fields that may be patched onto a buffered event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventPatch {
    pub persisted_record_id: Option<RecordId>,
}

impl EventPatch {
    pub fn record_id(id: RecordId) -> Self {
        Self {
            persisted_record_id: Some(id),
        }
    }

    /// Copy of `event` with this patch applied.
    pub fn apply(&self, event: &LiveEvent) -> LiveEvent {
        let mut patched = event.clone();
        if let Some(id) = &self.persisted_record_id {
            patched.persisted_record_id = Some(id.clone());
        }
        patched
    }
}
