//! # Realtime Protocol Messages
//!
//! Phoenix channel messages spoken by the backend's realtime server.
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Realtime Channel Messages                           │
//! │                                                                         │
//! │  JOIN                                                                  │
//! │  ────                                                                  │
//! │  client ───► phx_join  topic=realtime:public:products                  │
//! │              { config: { postgres_changes: [{ event: "*", ... }] },    │
//! │                access_token }                                          │
//! │  server ◄─── phx_reply { status: "ok" | "error", response }            │
//! │                                                                         │
//! │  ROW CHANGES                                                           │
//! │  ───────────                                                           │
//! │  server ◄─── postgres_changes                                          │
//! │              { data: { type: INSERT|UPDATE|DELETE,                     │
//! │                        record, old_record, commit_timestamp } }        │
//! │                                                                         │
//! │  KEEPALIVE                                                             │
//! │  ─────────                                                             │
//! │  client ───► heartbeat  topic=phoenix                                  │
//! │                                                                         │
//! │  LEAVE                                                                 │
//! │  ─────                                                                 │
//! │  client ───► phx_leave  topic=realtime:public:products                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format (vsn 1.0.0)
//! ```json
//! { "topic": "...", "event": "...", "payload": { ... }, "ref": "1" }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::channel::{ChangeEvent, ChangeKind};
use crate::gateway::ProductRow;

/// Protocol version sent as the `vsn` query parameter.
pub const PROTOCOL_VSN: &str = "1.0.0";

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";

const HEARTBEAT_TOPIC: &str = "phoenix";

/// Channel topic for a table in the `public` schema.
pub fn table_topic(table: &str) -> String {
    format!("realtime:public:{table}")
}

// =============================================================================
// Phoenix Message
// =============================================================================

/// A single Phoenix channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl PhoenixMessage {
    /// Join request subscribing to every change on `table`.
    pub fn join(table: &str, access_token: Option<&str>, reference: u64) -> Self {
        let mut payload = json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "*", "schema": "public", "table": table }
                ]
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        PhoenixMessage {
            topic: table_topic(table),
            event: EVENT_JOIN.to_string(),
            payload,
            reference: Some(reference.to_string()),
        }
    }

    pub fn leave(topic: &str, reference: u64) -> Self {
        PhoenixMessage {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn heartbeat(reference: u64) -> Self {
        PhoenixMessage {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(reference.to_string()),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Status of a `phx_reply` (`ok` / `error`).
    pub fn reply_status(&self) -> Option<&str> {
        if self.event != EVENT_REPLY {
            return None;
        }
        self.payload.get("status").and_then(Value::as_str)
    }

    /// Extracts a row change if this frame carries one.
    ///
    /// Returns `None` for every other event, and for change payloads that do
    /// not parse (logged by the caller).
    pub fn change_event(&self) -> Option<Result<ChangeEvent, serde_json::Error>> {
        if self.event != EVENT_POSTGRES_CHANGES {
            return None;
        }
        let data = self.payload.get("data")?;
        Some(serde_json::from_value::<ChangeData>(data.clone()).and_then(ChangeData::into_event))
    }
}

// =============================================================================
// Change Payload
// =============================================================================

/// `payload.data` of a `postgres_changes` frame.
///
/// Accepts both the server field names (`type`, `record`, `old_record`) and
/// the client-library names (`eventType`, `new`, `old`).
#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type", alias = "eventType")]
    kind: ChangeKind,
    #[serde(default, alias = "new")]
    record: Option<Value>,
    #[serde(default, alias = "old")]
    old_record: Option<Value>,
    #[serde(default)]
    commit_timestamp: Option<String>,
}

impl ChangeData {
    fn into_event(self) -> Result<ChangeEvent, serde_json::Error> {
        let new = match self.record {
            Some(Value::Object(map)) if !map.is_empty() => {
                Some(serde_json::from_value::<ProductRow>(Value::Object(map))?)
            }
            _ => None,
        };
        let old = match self.old_record {
            Some(Value::Object(map)) if !map.is_empty() => Some(Value::Object(map)),
            _ => None,
        };
        Ok(ChangeEvent {
            kind: self.kind,
            new,
            old,
            commit_timestamp: self.commit_timestamp,
        })
    }
}
