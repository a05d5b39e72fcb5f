//! # reverie-shared
//!
//! Domain types and tuning constants shared between the Reverie store and
//! client crates.  Everything here is plain data: the structs mirror the wire
//! format of the conversation service (camelCase JSON) and are handed to the
//! UI layer unchanged.

pub mod constants;
pub mod types;

pub use types::*;
