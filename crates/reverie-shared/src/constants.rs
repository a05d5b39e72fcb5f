/// Bucket key used for a draft conversation that has no server id yet.
pub const DEFAULT_BUCKET: &str = "default";

/// Page size for the initial load and for `load_more_messages`.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Total stored messages above which progressive hydration kicks in.
pub const HYDRATION_THRESHOLD: u64 = 100;

/// Batch size for each hydration pass over the local store.
pub const HYDRATION_BATCH_SIZE: u32 = 200;

/// Safety cap on hydration iterations for a single conversation.
pub const HYDRATION_MAX_BATCHES: u32 = 64;

/// Text substituted into the assistant placeholder when a send fails.
pub const SEND_FAILURE_TEXT: &str = "Sorry, something went wrong. Please try again later.";

/// Response header carrying the server-assigned conversation id on the
/// streaming chat endpoint.
pub const CONVERSATION_ID_HEADER: &str = "X-Conversation-Id";

/// Error code surfaced to the UI for a generic storage failure
/// (corrupt or unavailable local store).
pub const ERROR_CODE_STORAGE: i32 = 3;

/// Error code surfaced to the UI when the local store schema is newer than
/// this build understands.
pub const ERROR_CODE_VERSION: i32 = 11;
