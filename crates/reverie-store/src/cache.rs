//! The [`LocalMessageCache`] seam between the client and the embedded store.
//!
//! The client never talks to [`Database`] directly; it goes through this
//! trait so that environments without a usable local store (no data
//! directory, read-only filesystem, tests) can substitute [`NoopCache`] and
//! every read degrades to the remote service while writes become harmless.

use reverie_shared::{ConversationMeta, Message};

use crate::database::Database;
use crate::Result;

/// Append/query cache over two logical collections: messages and
/// conversation metadata.
pub trait LocalMessageCache: Send + Sync {
    /// Whether the cache is actually backed by storage.  When `false` the
    /// client skips cache-first reads entirely.
    fn is_available(&self) -> bool;

    /// Idempotent batch upsert of messages for one conversation.
    fn put_messages(&self, conversation_id: &str, batch: &[Message]) -> Result<()>;

    /// The newest `limit` messages, ascending by timestamp.
    fn latest_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>>;

    /// Messages strictly older than `before_ts` (newest-first window of
    /// `limit`), returned ascending by timestamp.
    fn messages_older_than(
        &self,
        conversation_id: &str,
        before_ts: i64,
        limit: u32,
    ) -> Result<Vec<Message>>;

    /// Total stored messages for a conversation.
    fn count_messages(&self, conversation_id: &str) -> Result<u64>;

    /// Cached conversation metadata, if any.
    fn conversation_meta(&self, id: &str) -> Result<Option<ConversationMeta>>;

    /// Upsert conversation metadata.
    fn put_conversation_meta(&self, meta: &ConversationMeta) -> Result<()>;

    /// Drop a conversation and its messages from the cache.
    fn delete_conversation(&self, id: &str) -> Result<()>;
}

impl LocalMessageCache for Database {
    fn is_available(&self) -> bool {
        true
    }

    fn put_messages(&self, conversation_id: &str, batch: &[Message]) -> Result<()> {
        Database::put_messages(self, conversation_id, batch)
    }

    fn latest_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        Database::latest_messages(self, conversation_id, limit)
    }

    fn messages_older_than(
        &self,
        conversation_id: &str,
        before_ts: i64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        Database::messages_older_than(self, conversation_id, before_ts, limit)
    }

    fn count_messages(&self, conversation_id: &str) -> Result<u64> {
        Database::count_messages(self, conversation_id)
    }

    fn conversation_meta(&self, id: &str) -> Result<Option<ConversationMeta>> {
        Database::conversation_meta(self, id)
    }

    fn put_conversation_meta(&self, meta: &ConversationMeta) -> Result<()> {
        Database::put_conversation_meta(self, meta)
    }

    fn delete_conversation(&self, id: &str) -> Result<()> {
        Database::delete_conversation(self, id)
    }
}

/// Cache stand-in for environments without local storage.  All reads come
/// back empty and all writes succeed without effect, so the client stays
/// correct and merely loses the caching benefit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

impl LocalMessageCache for NoopCache {
    fn is_available(&self) -> bool {
        false
    }

    fn put_messages(&self, _conversation_id: &str, _batch: &[Message]) -> Result<()> {
        Ok(())
    }

    fn latest_messages(&self, _conversation_id: &str, _limit: u32) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }

    fn messages_older_than(
        &self,
        _conversation_id: &str,
        _before_ts: i64,
        _limit: u32,
    ) -> Result<Vec<Message>> {
        Ok(Vec::new())
    }

    fn count_messages(&self, _conversation_id: &str) -> Result<u64> {
        Ok(0)
    }

    fn conversation_meta(&self, _id: &str) -> Result<Option<ConversationMeta>> {
        Ok(None)
    }

    fn put_conversation_meta(&self, _meta: &ConversationMeta) -> Result<()> {
        Ok(())
    }

    fn delete_conversation(&self, _id: &str) -> Result<()> {
        Ok(())
    }
}
