//! # reverie-client
//!
//! Conversation core for the Reverie persona chatbot: the state controller
//! that the UI layer drives, the HTTP client for the remote conversation
//! service, the streaming-response assembler, and the background hydration
//! task that pulls full history out of the local cache during idle time.
//!
//! The crate is a library embedded in a UI shell; it exposes no CLI surface.

pub mod api;
pub mod controller;
pub mod state;
pub mod stream;

mod error;
mod hydration;

pub use api::{ApiClient, ChatBackend, ChatReply};
pub use controller::ChatController;
pub use error::ClientError;
pub use state::ChatState;

use tracing_subscriber::{fmt, EnvFilter};

pub type Result<T> = std::result::Result<T, ClientError>;

/// Install the default tracing subscriber for an embedding application.
///
/// Honors `RUST_LOG` when set, otherwise enables debug logging for the
/// Reverie crates and warnings for everything else.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reverie_client=debug,reverie_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
