//! Cache operations for [`ConversationMeta`] records.

use rusqlite::params;

use reverie_shared::ConversationMeta;

use crate::database::Database;
use crate::error::StoreError;
use crate::Result;

impl Database {
    /// Upsert conversation metadata.
    pub fn put_conversation_meta(&self, meta: &ConversationMeta) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO conversations (id, persona_id) VALUES (?1, ?2)",
                params![meta.id, meta.persona_id],
            )?;
            Ok(())
        })
    }

    /// Fetch cached metadata for a conversation, if present.
    pub fn conversation_meta(&self, id: &str) -> Result<Option<ConversationMeta>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, persona_id FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(ConversationMeta {
                        id: row.get(0)?,
                        persona_id: row.get(1)?,
                    })
                },
            );
            match result {
                Ok(meta) => Ok(Some(meta)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(StoreError::Sqlite(e)),
            }
        })
    }

    /// Remove a conversation and its cached messages.
    pub fn delete_conversation(&self, id: &str) -> Result<()> {
        self.delete_messages(id)?;
        self.with_conn(|conn| {
            conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_shared::{Message, Role};

    #[test]
    fn meta_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("cache.db")).unwrap();

        assert!(db.conversation_meta("c1").unwrap().is_none());

        let meta = ConversationMeta {
            id: "c1".into(),
            persona_id: Some("moses".into()),
        };
        db.put_conversation_meta(&meta).unwrap();
        assert_eq!(db.conversation_meta("c1").unwrap(), Some(meta));
    }

    #[test]
    fn delete_cascades_to_messages() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("cache.db")).unwrap();

        db.put_conversation_meta(&ConversationMeta {
            id: "c1".into(),
            persona_id: None,
        })
        .unwrap();
        db.put_messages(
            "c1",
            &[Message {
                id: "m1".into(),
                role: Role::User,
                content: "hi".into(),
                timestamp: 1,
            }],
        )
        .unwrap();

        db.delete_conversation("c1").unwrap();
        assert!(db.conversation_meta("c1").unwrap().is_none());
        assert_eq!(db.count_messages("c1").unwrap(), 0);
    }
}
