//! v001 -- Initial schema creation.
//!
//! Creates the two core tables: `messages` and `conversations`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
--
-- `key` is the composite (conversation_id, timestamp, message_id) so
-- re-inserting the same batch is an idempotent upsert.  The covering
-- index supports descending cursor scans bounded by a timestamp.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    key             TEXT PRIMARY KEY NOT NULL,  -- "<conv>:<ts>:<id>"
    conversation_id TEXT NOT NULL,
    message_id      TEXT NOT NULL,
    role            TEXT NOT NULL,              -- "user" | "assistant"
    content         TEXT NOT NULL,
    timestamp       INTEGER NOT NULL            -- epoch milliseconds
);

CREATE INDEX IF NOT EXISTS idx_messages_conv_ts
    ON messages(conversation_id, timestamp DESC);

-- ----------------------------------------------------------------
-- Conversations (cached metadata only; the server owns the record)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS conversations (
    id         TEXT PRIMARY KEY NOT NULL,
    persona_id TEXT
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
