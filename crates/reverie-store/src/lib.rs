//! # reverie-store
//!
//! Local embedded message cache for the Reverie client, backed by SQLite.
//!
//! The store holds two record kinds -- conversation metadata and individual
//! messages -- and serves as a fast-read cache and offline buffer in front of
//! the remote conversation service.  It can be rebuilt from the server at any
//! time, so nothing here is a source of truth.
//!
//! The [`LocalMessageCache`] trait abstracts the store so that environments
//! without a usable data directory degrade to [`NoopCache`] and the client
//! falls back to remote-only reads.

pub mod cache;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;

mod error;

pub use cache::{LocalMessageCache, NoopCache};
pub use database::Database;
pub use error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;
