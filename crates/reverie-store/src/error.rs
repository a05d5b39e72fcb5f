use thiserror::Error;

use reverie_shared::constants::{ERROR_CODE_STORAGE, ERROR_CODE_VERSION};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// The on-disk schema is newer than this build understands.
    #[error("Database schema version {found} is newer than supported version {supported}")]
    VersionMismatch { found: u32, supported: u32 },
}

impl StoreError {
    /// Numeric code surfaced to the UI so it can offer a matching recovery
    /// action: reset the local cache vs. reload from the server.
    pub fn code(&self) -> i32 {
        match self {
            StoreError::VersionMismatch { .. } => ERROR_CODE_VERSION,
            _ => ERROR_CODE_STORAGE,
        }
    }
}
