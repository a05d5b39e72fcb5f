//! Controller state and the pure list-merge helpers.
//!
//! All message lists live behind `Arc` and every mutation replaces the whole
//! list (copy-on-write), so a reader holding a snapshot never observes a
//! partially-updated collection.  The merge/dedup functions are pure so the
//! ordering and dedup invariants can be checked in isolation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use reverie_shared::{ConversationSummary, Message, PagingCursor};

/// Snapshot of everything the UI renders.
///
/// Buckets in `messages` are keyed by conversation id, or
/// [`DEFAULT_BUCKET`](reverie_shared::constants::DEFAULT_BUCKET) for a draft
/// conversation the server has not acknowledged yet.
#[derive(Debug, Default, Clone)]
pub struct ChatState {
    pub messages: HashMap<String, Arc<Vec<Message>>>,
    pub current_persona_id: Option<String>,
    pub current_conversation_id: Option<String>,
    pub conversations: Vec<ConversationSummary>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub error_code: Option<i32>,
    pub paging: HashMap<String, PagingCursor>,
}

impl ChatState {
    /// The message list for a bucket (empty if absent).  Cheap: clones the
    /// `Arc`, not the list.
    pub fn bucket(&self, key: &str) -> Arc<Vec<Message>> {
        self.messages.get(key).cloned().unwrap_or_default()
    }

    /// Replace a bucket wholesale.
    pub fn set_bucket(&mut self, key: &str, list: Vec<Message>) {
        self.messages.insert(key.to_string(), Arc::new(list));
    }

    /// Append messages to a bucket via snapshot-copy.
    pub fn append_to_bucket(&mut self, key: &str, additions: &[Message]) {
        let mut list = self.bucket(key).as_ref().clone();
        list.extend_from_slice(additions);
        self.set_bucket(key, list);
    }

    /// Replace the content of the trailing placeholder message.
    ///
    /// Scans from the end for `placeholder_id` so concurrent prepends (older
    /// pages merging in) cannot redirect the write to the wrong element.
    /// Returns `false` when the placeholder is gone (bucket cleared or moved),
    /// in which case nothing is written.
    pub fn replace_placeholder(&mut self, key: &str, placeholder_id: &str, content: &str) -> bool {
        let mut list = self.bucket(key).as_ref().clone();
        let Some(pos) = list.iter().rposition(|m| m.id == placeholder_id) else {
            return false;
        };
        list[pos].content = content.to_string();
        self.set_bucket(key, list);
        true
    }

    /// Atomically move a bucket to a new key (draft -> server-assigned id).
    ///
    /// Single-map mutation under the caller's lock: no intermediate state
    /// where both buckets are empty is ever observable.
    pub fn move_bucket(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(list) = self.messages.remove(from) {
            self.messages.insert(to.to_string(), list);
        }
    }

    /// Record an error for the UI.
    pub fn set_error(&mut self, message: String, code: Option<i32>) {
        self.error = Some(message);
        self.error_code = code;
    }

    /// Clear error state ahead of a fresh operation.
    pub fn clear_error(&mut self) {
        self.error = None;
        self.error_code = None;
    }
}

// ---------------------------------------------------------------------------
// Pure merge helpers
// ---------------------------------------------------------------------------

/// Sort ascending by timestamp (stable) and drop `(id, timestamp)` duplicates,
/// keeping the first occurrence.
pub fn dedup_sorted(mut messages: Vec<Message>) -> Vec<Message> {
    messages.sort_by_key(|m| m.timestamp);
    let mut seen: HashSet<(String, i64)> = HashSet::with_capacity(messages.len());
    messages.retain(|m| seen.insert((m.id.clone(), m.timestamp)));
    messages
}

/// Merge an older batch in front of the existing list, deduplicated and
/// ascending.  Used by pagination and hydration; both are defensive about
/// overlap with what is already displayed.
pub fn merge_older(batch: &[Message], existing: &[Message]) -> Vec<Message> {
    let mut combined = Vec::with_capacity(batch.len() + existing.len());
    combined.extend_from_slice(batch);
    combined.extend_from_slice(existing);
    dedup_sorted(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_shared::Role;

    fn msg(id: &str, ts: i64) -> Message {
        Message {
            id: id.into(),
            role: Role::User,
            content: format!("content-{id}"),
            timestamp: ts,
        }
    }

    #[test]
    fn dedup_drops_id_timestamp_pairs_only() {
        let out = dedup_sorted(vec![msg("a", 1), msg("a", 1), msg("a", 2), msg("b", 1)]);
        let keys: Vec<(&str, i64)> = out.iter().map(|m| (m.id.as_str(), m.timestamp)).collect();
        assert_eq!(keys, vec![("a", 1), ("b", 1), ("a", 2)]);
    }

    #[test]
    fn merge_older_prepends_sorted_without_duplicates() {
        let existing = vec![msg("c", 30), msg("d", 40)];
        let batch = vec![msg("a", 10), msg("b", 20), msg("c", 30)];
        let out = merge_older(&batch, &existing);
        let ts: Vec<i64> = out.iter().map(|m| m.timestamp).collect();
        assert_eq!(ts, vec![10, 20, 30, 40]);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn replace_placeholder_survives_prepends() {
        let mut state = ChatState::default();
        state.set_bucket("c1", vec![msg("user-1", 100), msg("assistant-1", 101)]);

        // An older page lands in front; indices shift, the id does not.
        let merged = merge_older(&[msg("old-1", 1), msg("old-2", 2)], &state.bucket("c1"));
        state.set_bucket("c1", merged);

        assert!(state.replace_placeholder("c1", "assistant-1", "streamed text"));
        let list = state.bucket("c1");
        assert_eq!(list.last().unwrap().content, "streamed text");
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn replace_placeholder_refuses_missing_target() {
        let mut state = ChatState::default();
        state.set_bucket("c1", vec![msg("user-1", 100)]);
        assert!(!state.replace_placeholder("c1", "assistant-9", "late delta"));
        assert_eq!(state.bucket("c1").len(), 1);
    }

    #[test]
    fn move_bucket_is_single_step() {
        let mut state = ChatState::default();
        state.set_bucket("default", vec![msg("a", 1), msg("b", 2)]);
        state.move_bucket("default", "conv-123");

        assert!(state.messages.get("default").is_none());
        assert_eq!(state.bucket("conv-123").len(), 2);
    }

    #[test]
    fn snapshot_readers_keep_old_list_across_mutation() {
        let mut state = ChatState::default();
        state.set_bucket("c1", vec![msg("a", 1)]);
        let snapshot = state.bucket("c1");

        state.append_to_bucket("c1", &[msg("b", 2)]);

        assert_eq!(snapshot.len(), 1);
        assert_eq!(state.bucket("c1").len(), 2);
    }
}
