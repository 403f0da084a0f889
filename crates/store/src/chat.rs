use chrono::Utc;
use rusqlite::params;
use serde_json::Value;

use crate::error::Result;
use crate::schema::{ChatMessage, ChatRole};
use crate::Store;

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<ChatMessage> {
    Ok(ChatMessage {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        role: ChatRole::from_str(&row.get::<_, String>("role")?),
        content: row.get("content")?,
        ts: row.get::<_, String>("ts")?.parse().unwrap_or_else(|_| Utc::now()),
        metadata: serde_json::from_str(&row.get::<_, String>("metadata")?).unwrap_or(Value::Null),
    })
}

impl Store {
    pub fn insert_chat_message(
        &self,
        session_id: &str,
        role: ChatRole,
        content: &str,
        metadata: &Value,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO chat_messages (session_id, role, content, ts, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                role.as_str(),
                content,
                Utc::now().to_rfc3339(),
                serde_json::to_string(metadata)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Ordered by `ts` ascending (spec.md §3).
    pub fn chat_history(&self, session_id: &str, limit: i64) -> Result<Vec<ChatMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM (SELECT * FROM chat_messages WHERE session_id = ?1 ORDER BY ts DESC LIMIT ?2)
             ORDER BY ts ASC",
        )?;
        let rows = stmt.query_map(params![session_id, limit], row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn delete_chat_session(&self, session_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM chat_messages WHERE session_id = ?1", params![session_id])?;
        Ok(())
    }

    pub fn list_chat_sessions(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT DISTINCT session_id FROM chat_messages")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_then_assistant_order_preserved() {
        let store = Store::open_in_memory().unwrap();
        store.insert_chat_message("s1", ChatRole::User, "hello", &Value::Null).unwrap();
        store.insert_chat_message("s1", ChatRole::Assistant, "hi there", &Value::Null).unwrap();
        let history = store.chat_history("s1", 20).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);
    }
}
