use thiserror::Error;

use reverie_store::StoreError;

/// Errors produced by the client layer.
///
/// The controller never lets these escape to the UI: every public operation
/// catches them and folds `to_string()` plus [`ClientError::code`] into
/// controller state.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level HTTP failure.
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-OK response from the conversation service.
    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    /// 401 from a conversation-scoped endpoint.
    #[error("Not authenticated")]
    Unauthorized,

    /// 404 from a detail endpoint.
    #[error("Conversation not found")]
    NotFound,

    /// Local cache failure.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// The streaming response broke mid-flight.
    #[error("Stream error: {0}")]
    Stream(String),
}

impl ClientError {
    /// Numeric error code for the UI, present only for failure classes that
    /// have a distinct recovery action (local storage problems).
    pub fn code(&self) -> Option<i32> {
        match self {
            ClientError::Store(e) => Some(e.code()),
            _ => None,
        }
    }
}
