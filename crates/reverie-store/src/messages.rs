//! Cache operations for [`Message`] records.

use rusqlite::params;

use reverie_shared::{Message, Role};

use crate::database::Database;
use crate::Result;

impl Database {
    /// Upsert a batch of messages for a conversation in one transaction.
    ///
    /// Keyed by `(conversation_id, timestamp, id)`, so re-writing a batch that
    /// overlaps an earlier one is harmless.
    pub fn put_messages(&self, conversation_id: &str, batch: &[Message]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            conn.execute_batch("BEGIN")?;
            let result = (|| -> Result<()> {
                let mut stmt = conn.prepare_cached(
                    "INSERT OR REPLACE INTO messages
                         (key, conversation_id, message_id, role, content, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for m in batch {
                    let key = format!("{}:{}:{}", conversation_id, m.timestamp, m.id);
                    stmt.execute(params![
                        key,
                        conversation_id,
                        m.id,
                        role_to_str(m.role),
                        m.content,
                        m.timestamp,
                    ])?;
                }
                Ok(())
            })();
            match result {
                Ok(()) => {
                    conn.execute_batch("COMMIT")?;
                    Ok(())
                }
                Err(e) => {
                    let _ = conn.execute_batch("ROLLBACK");
                    Err(e)
                }
            }
        })
    }

    /// The newest `limit` messages for a conversation, ascending by timestamp.
    pub fn latest_messages(&self, conversation_id: &str, limit: u32) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT message_id, role, content, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp DESC
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![conversation_id, limit], row_to_message)?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            messages.reverse();
            Ok(messages)
        })
    }

    /// Messages strictly older than `before_ts`, newest-first capped at
    /// `limit`, returned ascending by timestamp.
    pub fn messages_older_than(
        &self,
        conversation_id: &str,
        before_ts: i64,
        limit: u32,
    ) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT message_id, role, content, timestamp
                 FROM messages
                 WHERE conversation_id = ?1 AND timestamp < ?2
                 ORDER BY timestamp DESC
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![conversation_id, before_ts, limit], row_to_message)?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            messages.reverse();
            Ok(messages)
        })
    }

    /// Total stored messages for a conversation.
    pub fn count_messages(&self, conversation_id: &str) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Remove every cached message for a conversation.  Returns the number of
    /// rows deleted.
    pub fn delete_messages(&self, conversation_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let affected = conn.execute(
                "DELETE FROM messages WHERE conversation_id = ?1",
                params![conversation_id],
            )?;
            Ok(affected)
        })
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id: String = row.get(0)?;
    let role_str: String = row.get(1)?;
    let content: String = row.get(2)?;
    let timestamp: i64 = row.get(3)?;

    let role = match role_str.as_str() {
        "user" => Role::User,
        "assistant" => Role::Assistant,
        other => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("unknown role: {other}").into(),
            ))
        }
    };

    Ok(Message {
        id,
        role,
        content,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("cache.db")).unwrap();
        (dir, db)
    }

    fn msg(id: &str, role: Role, content: &str, ts: i64) -> Message {
        Message {
            id: id.into(),
            role,
            content: content.into(),
            timestamp: ts,
        }
    }

    #[test]
    fn latest_messages_ascending_window() {
        let (_dir, db) = open_db();
        let batch: Vec<Message> = (0..10)
            .map(|i| msg(&format!("m{i}"), Role::User, "x", 1000 + i))
            .collect();
        db.put_messages("c1", &batch).unwrap();

        let latest = db.latest_messages("c1", 3).unwrap();
        let ts: Vec<i64> = latest.iter().map(|m| m.timestamp).collect();
        assert_eq!(ts, vec![1007, 1008, 1009]);
    }

    #[test]
    fn put_is_idempotent() {
        let (_dir, db) = open_db();
        let batch = vec![
            msg("a", Role::User, "hi", 1),
            msg("b", Role::Assistant, "hello", 2),
        ];
        db.put_messages("c1", &batch).unwrap();
        db.put_messages("c1", &batch).unwrap();

        assert_eq!(db.count_messages("c1").unwrap(), 2);
    }

    #[test]
    fn older_than_bound_is_exclusive() {
        let (_dir, db) = open_db();
        let batch: Vec<Message> = (0..5)
            .map(|i| msg(&format!("m{i}"), Role::Assistant, "x", 100 + i))
            .collect();
        db.put_messages("c1", &batch).unwrap();

        let older = db.messages_older_than("c1", 102, 10).unwrap();
        let ts: Vec<i64> = older.iter().map(|m| m.timestamp).collect();
        assert_eq!(ts, vec![100, 101]);
    }

    #[test]
    fn older_than_respects_limit_from_newest() {
        let (_dir, db) = open_db();
        let batch: Vec<Message> = (0..6)
            .map(|i| msg(&format!("m{i}"), Role::User, "x", 10 + i))
            .collect();
        db.put_messages("c1", &batch).unwrap();

        // Of everything below 15 (10..=14), the newest two are 13 and 14.
        let older = db.messages_older_than("c1", 15, 2).unwrap();
        let ts: Vec<i64> = older.iter().map(|m| m.timestamp).collect();
        assert_eq!(ts, vec![13, 14]);
    }

    #[test]
    fn delete_messages_clears_conversation_only() {
        let (_dir, db) = open_db();
        db.put_messages("c1", &[msg("a", Role::User, "x", 1)]).unwrap();
        db.put_messages("c2", &[msg("b", Role::User, "y", 2)]).unwrap();

        assert_eq!(db.delete_messages("c1").unwrap(), 1);
        assert_eq!(db.count_messages("c1").unwrap(), 0);
        assert_eq!(db.count_messages("c2").unwrap(), 1);
    }
}
