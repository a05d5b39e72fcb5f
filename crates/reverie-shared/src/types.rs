//! Domain model structs exchanged with the conversation service and the UI.
//!
//! Every struct (de)serializes as camelCase JSON so it can be handed directly
//! to the web layer without renaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single chat message.
///
/// For assistant messages the content grows while the response streams, then
/// freezes.  `timestamp` (epoch milliseconds) is the sole ordering and
/// pagination key; `(id, timestamp)` together form the dedup key because ids
/// may collide across reload paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

impl Message {
    /// Synthesize a client-side message with a fresh uuid and the current
    /// wall-clock millisecond timestamp.
    pub fn client_generated(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// The `(id, timestamp)` pair used for deduplication.
    pub fn dedup_key(&self) -> (&str, i64) {
        (self.id.as_str(), self.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Denormalized summary of the newest message, for list views only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub content: String,
    pub timestamp: i64,
    pub role: String,
}

/// A conversation as returned by the list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub persona_id: Option<String>,
    pub persona_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_message: Option<LastMessage>,
}

/// Minimal conversation metadata kept in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMeta {
    pub id: String,
    pub persona_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Paging
// ---------------------------------------------------------------------------

/// Per-conversation pagination cursor.
///
/// `last_loaded_ts` is the timestamp of the oldest message currently in
/// memory; it only ever moves backward over the life of a paging session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingCursor {
    pub has_more: bool,
    pub last_loaded_ts: Option<i64>,
    pub page_size: u32,
}

impl PagingCursor {
    pub fn new(last_loaded_ts: Option<i64>, page_size: u32) -> Self {
        Self {
            has_more: true,
            last_loaded_ts,
            page_size,
        }
    }
}

// ---------------------------------------------------------------------------
// Persona
// ---------------------------------------------------------------------------

/// A persona as served by the persona listing endpoint.
///
/// The core only needs `id` and `name` for labeling; the remaining fields are
/// carried through for the UI and the struct tolerates unknown extras.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub beliefs: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn summary_parses_camel_case() {
        let json = r#"{
            "id": "c1",
            "personaId": "moses",
            "personaName": "Moses",
            "createdAt": "2024-05-01T12:00:00Z",
            "updatedAt": "2024-05-02T12:00:00Z",
            "lastMessage": {"content": "hi", "timestamp": 1714651200000, "role": "user"}
        }"#;
        let summary: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.persona_id.as_deref(), Some("moses"));
        assert_eq!(summary.last_message.unwrap().timestamp, 1714651200000);
    }

    #[test]
    fn persona_tolerates_extra_fields() {
        let json = r#"{"id": "p1", "name": "Ada", "embedding": [0.1, 0.2], "votes": 3}"#;
        let persona: Persona = serde_json::from_str(json).unwrap();
        assert_eq!(persona.name, "Ada");
        assert!(persona.traits.is_empty());
    }
}
