use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::schema::AgentSession;
use crate::Store;

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<AgentSession> {
    Ok(AgentSession {
        id: row.get("id")?,
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
        task_type: row.get("task_type")?,
        state_json: serde_json::from_str(&row.get::<_, String>("state_json")?).unwrap_or(Value::Null),
        profile_json: serde_json::from_str(&row.get::<_, String>("profile_json")?).unwrap_or(Value::Null),
        plan_json: serde_json::from_str(&row.get::<_, String>("plan_json")?).unwrap_or(Value::Null),
        graph_json: serde_json::from_str(&row.get::<_, String>("graph_json")?).unwrap_or(Value::Null),
        status: row.get("status")?,
    })
}

impl Store {
    pub fn upsert_session(&self, session: &AgentSession) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO agent_sessions (id, created_at, task_type, state_json, profile_json, plan_json, graph_json, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                task_type = excluded.task_type,
                state_json = excluded.state_json,
                profile_json = excluded.profile_json,
                plan_json = excluded.plan_json,
                graph_json = excluded.graph_json,
                status = excluded.status",
            params![
                session.id,
                session.created_at.to_rfc3339(),
                session.task_type,
                serde_json::to_string(&session.state_json)?,
                serde_json::to_string(&session.profile_json)?,
                serde_json::to_string(&session.plan_json)?,
                serde_json::to_string(&session.graph_json)?,
                session.status,
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &str) -> Result<Option<AgentSession>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM agent_sessions WHERE id = ?1", params![id], row_to_session)
            .optional()
            .map_err(Into::into)
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM agent_sessions WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM chat_messages WHERE session_id = ?1", params![id])?;
        Ok(())
    }

    pub fn list_sessions(&self) -> Result<Vec<AgentSession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM agent_sessions ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], row_to_session)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}
