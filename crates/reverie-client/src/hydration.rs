//! Progressive history hydration.
//!
//! After a conversation's first page is on screen, the rest of its cached
//! history is pulled into memory in fixed-size batches so scrollback is
//! instant.  The task is cooperative: it yields between batches and re-checks
//! that the conversation is still the active one before every merge, which is
//! the whole cancellation mechanism -- no token, just a guard re-evaluated at
//! each suspension point.

use std::sync::Arc;

use reverie_shared::constants::{HYDRATION_BATCH_SIZE, HYDRATION_MAX_BATCHES};

use crate::controller::ChatController;
use crate::state::merge_older;

/// Walk older pages out of the local cache into the conversation's bucket.
///
/// Stops on an empty batch, on the safety cap, or as soon as the user has
/// navigated to a different conversation.  Merges are defensive: dedup by
/// `(id, timestamp)` on every batch.  The boundary advances to the oldest
/// merged timestamp; the fetch bound is strictly exclusive, so every batch
/// lands strictly below the previous one and no timestamp is skipped.
pub(crate) async fn hydrate(controller: Arc<ChatController>, conversation_id: String) {
    let mut boundary = {
        let state = controller.lock_state();
        state
            .bucket(&conversation_id)
            .first()
            .map(|m| m.timestamp)
            .unwrap_or(i64::MAX)
    };

    for batch_no in 0..HYDRATION_MAX_BATCHES {
        if !is_active(&controller, &conversation_id) {
            tracing::debug!(conversation = %conversation_id, "hydration cancelled: conversation switched");
            return;
        }

        let batch = match controller.cache.messages_older_than(
            &conversation_id,
            boundary,
            HYDRATION_BATCH_SIZE,
        ) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(conversation = %conversation_id, error = %e, "hydration read failed");
                return;
            }
        };
        if batch.is_empty() {
            tracing::debug!(
                conversation = %conversation_id,
                batches = batch_no,
                "hydration complete"
            );
            return;
        }

        let Some(batch_oldest) = batch.first().map(|m| m.timestamp) else {
            return;
        };

        {
            let mut state = controller.lock_state();
            // Re-checked under the lock: the switch may have happened while
            // the cache read was in flight.
            if state.current_conversation_id.as_deref() != Some(conversation_id.as_str()) {
                tracing::debug!(conversation = %conversation_id, "hydration cancelled before merge");
                return;
            }
            let merged = merge_older(&batch, &state.bucket(&conversation_id));
            state.set_bucket(&conversation_id, merged);
        }

        boundary = batch_oldest;
        tokio::task::yield_now().await;
    }

    tracing::warn!(conversation = %conversation_id, "hydration stopped at batch cap");
}

fn is_active(controller: &ChatController, conversation_id: &str) -> bool {
    controller.lock_state().current_conversation_id.as_deref() == Some(conversation_id)
}
