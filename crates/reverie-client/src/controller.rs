//! The conversation state controller.
//!
//! Owns all in-memory conversation state and every public read/write
//! operation the UI uses.  Orchestrates the local message cache (fast reads,
//! offline buffer) and the remote conversation service (source of truth),
//! plus the streaming assembler for in-flight assistant turns.
//!
//! Failure policy: every operation catches its own errors and folds them into
//! `(error, error_code)` on [`ChatState`]; nothing here panics the UI layer.
//! Retry is always an explicit re-invocation by the user.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reverie_shared::constants::{DEFAULT_BUCKET, DEFAULT_PAGE_SIZE, HYDRATION_THRESHOLD, SEND_FAILURE_TEXT};
use reverie_shared::{ConversationMeta, Message, PagingCursor, Persona, Role};
use reverie_store::LocalMessageCache;

use crate::api::{ChatBackend, ChatReply};
use crate::error::ClientError;
use crate::state::{dedup_sorted, merge_older, ChatState};
use crate::{hydration, stream};

/// Central controller; shared with the UI and the hydration task as
/// `Arc<ChatController>`.
pub struct ChatController {
    pub(crate) state: Mutex<ChatState>,
    pub(crate) backend: Arc<dyn ChatBackend>,
    pub(crate) cache: Arc<dyn LocalMessageCache>,
    /// Per-bucket send serialization: a second send against the same bucket
    /// waits for the first to finish (and, for a draft, for id
    /// reconciliation) before it starts.
    send_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ChatController {
    pub fn new(backend: Arc<dyn ChatBackend>, cache: Arc<dyn LocalMessageCache>) -> Self {
        Self {
            state: Mutex::new(ChatState::default()),
            backend,
            cache,
            send_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Cheap copy of the full state for rendering.  Message lists are shared
    /// by `Arc`, so this never deep-copies history.
    pub fn snapshot(&self) -> ChatState {
        self.lock_state().clone()
    }

    /// The message list for one bucket.
    pub fn messages_for(&self, key: &str) -> Arc<Vec<Message>> {
        self.lock_state().bucket(key)
    }

    pub fn current_conversation_id(&self) -> Option<String> {
        self.lock_state().current_conversation_id.clone()
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ChatState> {
        // Never held across an await; a poisoned lock only means a panicking
        // test thread, so take the data as-is.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send_lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .send_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }

    // ------------------------------------------------------------------
    // Persona selection
    // ------------------------------------------------------------------

    /// Set the active persona and load the cached draft bucket.
    ///
    /// Only the draft bucket is replaced; other conversations' state is
    /// untouched.
    pub async fn select_persona(&self, persona_id: Option<String>) {
        let cached = match self.cache.latest_messages(DEFAULT_BUCKET, DEFAULT_PAGE_SIZE) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "draft history unavailable, starting empty");
                Vec::new()
            }
        };

        let mut state = self.lock_state();
        state.current_persona_id = persona_id;
        state.set_bucket(DEFAULT_BUCKET, dedup_sorted(cached));
    }

    /// Personas for the picker; pure passthrough to the collaborator.
    pub async fn fetch_personas(&self) -> crate::Result<Vec<Persona>> {
        self.backend.list_personas().await
    }

    // ------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------

    /// Send one user turn: optimistic append, stream assembly, id
    /// reconciliation, cache persistence.
    pub async fn send_message(self: &Arc<Self>, text: &str, persona_id: Option<&str>) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        // Serialize sends per bucket; re-resolve the key after acquiring in
        // case a concurrent draft send just minted a conversation id.
        let initial_key = self.active_bucket_key();
        let send_lock = self.send_lock_for(&initial_key);
        let _send_guard = send_lock.lock().await;
        let key = self.active_bucket_key();

        let user_msg = Message::client_generated(Role::User, text);
        let placeholder = Message::client_generated(Role::Assistant, "");
        let placeholder_id = placeholder.id.clone();

        let conversation_id = {
            let mut state = self.lock_state();
            state.append_to_bucket(&key, &[user_msg, placeholder]);
            state.is_loading = true;
            state.clear_error();
            state.current_conversation_id.clone()
        };

        tracing::info!(bucket = %key, conversation = ?conversation_id, "sending message");

        let reply = self
            .backend
            .send_chat(persona_id, text, conversation_id.as_deref())
            .await;

        match reply {
            Ok(ChatReply::Complete {
                response,
                conversation_id: new_id,
            }) => {
                self.lock_state()
                    .replace_placeholder(&key, &placeholder_id, &response);
                self.finish_send(&key, new_id, persona_id).await;
            }
            Ok(ChatReply::Streaming {
                conversation_id: new_id,
                body,
            }) => {
                let mut shown = String::new();
                let assembled = stream::assemble(body, |delta| {
                    shown.push_str(delta);
                    self.lock_state()
                        .replace_placeholder(&key, &placeholder_id, &shown);
                })
                .await;

                match assembled {
                    Ok(full_text) => {
                        // The persisted copy comes from the assembler's own
                        // buffer, not from whatever the UI last displayed.
                        self.lock_state()
                            .replace_placeholder(&key, &placeholder_id, &full_text);
                        self.finish_send(&key, new_id, persona_id).await;
                    }
                    Err(e) => self.fail_send(&key, &placeholder_id, e),
                }
            }
            Err(e) => self.fail_send(&key, &placeholder_id, e),
        }
    }

    fn active_bucket_key(&self) -> String {
        self.lock_state()
            .current_conversation_id
            .clone()
            .unwrap_or_else(|| DEFAULT_BUCKET.to_string())
    }

    /// Finalize a successful send: reconcile a draft into its server id,
    /// persist the bucket, refresh the conversation list when a new id was
    /// minted.
    async fn finish_send(self: &Arc<Self>, key: &str, new_id: Option<String>, persona_id: Option<&str>) {
        let (final_key, minted) = {
            let mut state = self.lock_state();
            state.is_loading = false;
            match new_id {
                Some(id) if state.current_conversation_id.is_none() => {
                    // Draft -> id move, one mutation under one lock: readers
                    // never see the messages missing from both buckets.
                    state.move_bucket(key, &id);
                    state.current_conversation_id = Some(id.clone());
                    (id, true)
                }
                _ => (key.to_string(), false),
            }
        };

        let list = self.lock_state().bucket(&final_key);
        if let Err(e) = self.cache.put_messages(&final_key, &list) {
            tracing::warn!(bucket = %final_key, error = %e, "failed to persist messages");
        }

        if final_key != DEFAULT_BUCKET {
            let persona_id = persona_id
                .map(str::to_string)
                .or_else(|| self.lock_state().current_persona_id.clone());
            let meta = ConversationMeta {
                id: final_key.clone(),
                persona_id,
            };
            if let Err(e) = self.cache.put_conversation_meta(&meta) {
                tracing::warn!(conversation = %final_key, error = %e, "failed to persist metadata");
            }
            if minted {
                // The draft rows now live under the real id.
                if let Err(e) = self.cache.delete_conversation(DEFAULT_BUCKET) {
                    tracing::warn!(error = %e, "failed to clear draft cache");
                }
            }
        }

        if minted {
            tracing::info!(conversation = %final_key, "conversation created");
            self.fetch_conversations().await;
        }
    }

    /// Failed send: the user message stays, the placeholder becomes the fixed
    /// failure text, and the error lands in controller state for a retry
    /// affordance.
    fn fail_send(&self, key: &str, placeholder_id: &str, e: ClientError) {
        tracing::error!(bucket = %key, error = %e, "send failed");
        let list = {
            let mut state = self.lock_state();
            state.replace_placeholder(key, placeholder_id, SEND_FAILURE_TEXT);
            state.is_loading = false;
            state.set_error(e.to_string(), e.code());
            state.bucket(key)
        };
        if let Err(cache_err) = self.cache.put_messages(key, &list) {
            tracing::warn!(bucket = %key, error = %cache_err, "failed to persist after send failure");
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Switch to a conversation and publish its latest page.
    ///
    /// Prefers the local cache; falls back to the server (backfilling the
    /// cache) when the cache has no metadata or no messages.
    pub async fn load_conversation(self: &Arc<Self>, conversation_id: &str) {
        {
            let mut state = self.lock_state();
            state.is_loading = true;
            state.clear_error();
            // Drop anything shown for this id on a prior visit before the
            // fetch starts, so stale content can never flash or duplicate.
            state.set_bucket(conversation_id, Vec::new());
        }

        if let Err(e) = self.load_conversation_inner(conversation_id).await {
            tracing::error!(conversation = %conversation_id, error = %e, "failed to load conversation");
            let mut state = self.lock_state();
            state.set_error(e.to_string(), e.code());
            state.is_loading = false;
        }
    }

    async fn load_conversation_inner(self: &Arc<Self>, conversation_id: &str) -> crate::Result<()> {
        let mut persona_id: Option<String> = None;
        let mut initial: Vec<Message> = Vec::new();
        let mut from_cache = false;

        if self.cache.is_available() {
            if let Some(meta) = self.cache.conversation_meta(conversation_id)? {
                let cached = self
                    .cache
                    .latest_messages(conversation_id, DEFAULT_PAGE_SIZE)?;
                if !cached.is_empty() {
                    persona_id = meta.persona_id;
                    initial = cached;
                    from_cache = true;
                }
            }
        }

        if !from_cache {
            let detail = self.backend.conversation_detail(conversation_id).await?;
            persona_id = detail.conversation.persona_id.clone();

            // Backfill is best-effort; a cache write failure must not block
            // showing the conversation.
            let meta = ConversationMeta {
                id: conversation_id.to_string(),
                persona_id: persona_id.clone(),
            };
            if let Err(e) = self.cache.put_conversation_meta(&meta) {
                tracing::warn!(conversation = %conversation_id, error = %e, "metadata backfill failed");
            }
            if let Err(e) = self.cache.put_messages(conversation_id, &detail.messages) {
                tracing::warn!(conversation = %conversation_id, error = %e, "message backfill failed");
            }

            let mut all = dedup_sorted(detail.messages);
            let page = DEFAULT_PAGE_SIZE as usize;
            if all.len() > page {
                all = all.split_off(all.len() - page);
            }
            initial = all;
        }

        let initial = dedup_sorted(initial);
        let oldest_ts = initial.first().map(|m| m.timestamp);

        tracing::info!(
            conversation = %conversation_id,
            messages = initial.len(),
            from_cache,
            "conversation loaded"
        );

        {
            let mut state = self.lock_state();
            state.set_bucket(conversation_id, initial);
            state.current_persona_id = persona_id;
            state.current_conversation_id = Some(conversation_id.to_string());
            state.is_loading = false;
            state.paging.insert(
                conversation_id.to_string(),
                PagingCursor::new(oldest_ts, DEFAULT_PAGE_SIZE),
            );
        }

        if self.cache.is_available() {
            // The conversation is already on screen; a count failure only
            // costs us hydration, not the load.
            match self.cache.count_messages(conversation_id) {
                Ok(total) if total > HYDRATION_THRESHOLD => {
                    tokio::spawn(hydration::hydrate(
                        self.clone(),
                        conversation_id.to_string(),
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(conversation = %conversation_id, error = %e, "message count unavailable, skipping hydration");
                }
            }
        }

        Ok(())
    }

    /// Pull one older page into the conversation's bucket.  No-op once the
    /// cursor is exhausted.
    pub async fn load_more_messages(&self, conversation_id: &str) {
        let cursor = {
            let state = self.lock_state();
            match state.paging.get(conversation_id) {
                Some(c) if c.has_more => c.clone(),
                _ => return,
            }
        };

        let before = cursor.last_loaded_ts.unwrap_or(i64::MAX);
        let batch =
            match self
                .cache
                .messages_older_than(conversation_id, before, cursor.page_size)
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::error!(conversation = %conversation_id, error = %e, "failed to load older page");
                    let mut state = self.lock_state();
                    let code = e.code();
                    state.set_error(e.to_string(), Some(code));
                    return;
                }
            };

        let mut state = self.lock_state();
        if batch.is_empty() {
            if let Some(p) = state.paging.get_mut(conversation_id) {
                p.has_more = false;
            }
            return;
        }

        let batch_oldest = batch.first().map(|m| m.timestamp);
        let merged = merge_older(&batch, &state.bucket(conversation_id));
        state.set_bucket(conversation_id, merged);
        if let Some(p) = state.paging.get_mut(conversation_id) {
            // The boundary only ever moves backward.
            p.last_loaded_ts = match (p.last_loaded_ts, batch_oldest) {
                (Some(current), Some(new)) => Some(current.min(new)),
                (None, new) => new,
                (current, None) => current,
            };
        }
    }

    // ------------------------------------------------------------------
    // Conversation list
    // ------------------------------------------------------------------

    /// Refresh the conversation list, newest first.  Unauthenticated users
    /// simply have no conversations; that is not an error.
    pub async fn fetch_conversations(&self) {
        match self.backend.list_conversations().await {
            Ok(mut conversations) => {
                conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                self.lock_state().conversations = conversations;
            }
            Err(ClientError::Unauthorized) => {
                self.lock_state().conversations = Vec::new();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch conversations");
                self.lock_state().set_error(e.to_string(), e.code());
            }
        }
    }

    /// Delete a conversation remotely, then drop it from memory and cache.
    /// On failure state is left untouched apart from the surfaced error.
    pub async fn delete_conversation(&self, conversation_id: &str) {
        if let Err(e) = self.backend.delete_conversation(conversation_id).await {
            tracing::error!(conversation = %conversation_id, error = %e, "failed to delete conversation");
            self.lock_state().set_error(e.to_string(), e.code());
            return;
        }

        {
            let mut state = self.lock_state();
            state.conversations.retain(|c| c.id != conversation_id);
            if state.current_conversation_id.as_deref() == Some(conversation_id) {
                state.current_conversation_id = None;
            }
            state.messages.remove(conversation_id);
            state.paging.remove(conversation_id);
        }

        if let Err(e) = self.cache.delete_conversation(conversation_id) {
            tracing::warn!(conversation = %conversation_id, error = %e, "failed to purge local cache");
        }

        tracing::info!(conversation = %conversation_id, "conversation deleted");
        self.fetch_conversations().await;
    }

    /// Clear the active conversation and empty the draft bucket, ready for a
    /// fresh send to mint a new id.  Deletes nothing.
    pub fn start_new_conversation(&self) {
        let mut state = self.lock_state();
        state.current_conversation_id = None;
        state.set_bucket(DEFAULT_BUCKET, Vec::new());
    }
}
