use std::path::Path;

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

use crate::error::Result;
use crate::Store;

#[derive(Debug, Serialize, Default)]
pub struct PruneCounts {
    pub events_pruned: usize,
    pub proposals_pruned: usize,
    pub sessions_pruned: usize,
}

impl Store {
    pub fn prune(&self, event_days: i64, proposal_days: i64, session_days: i64) -> Result<PruneCounts> {
        let conn = self.conn.lock().unwrap();
        let event_cutoff = (Utc::now() - chrono::Duration::days(event_days)).to_rfc3339();
        let proposal_cutoff = (Utc::now() - chrono::Duration::days(proposal_days)).to_rfc3339();
        let session_cutoff = (Utc::now() - chrono::Duration::days(session_days)).to_rfc3339();

        let events_pruned = conn.execute("DELETE FROM events WHERE ts < ?1", params![event_cutoff])?;
        let proposals_pruned = conn.execute(
            "DELETE FROM proposals WHERE created_at < ?1 AND status IN ('expired', 'rejected', 'executed')",
            params![proposal_cutoff],
        )?;
        let sessions_pruned = conn.execute(
            "DELETE FROM agent_sessions WHERE created_at < ?1 AND status = 'completed'",
            params![session_cutoff],
        )?;

        Ok(PruneCounts {
            events_pruned,
            proposals_pruned,
            sessions_pruned,
        })
    }

    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    /// GDPR-style export: dumps every table to one JSON file per table
    /// under `dir`.
    pub fn export_all(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let tables = [
            "events",
            "contacts",
            "proposals",
            "observations",
            "preferences",
            "briefings",
            "memory_documents",
            "agent_sessions",
            "installed_skills",
            "chat_messages",
            "llm_calls",
        ];

        let conn = self.conn.lock().unwrap();
        for table in tables {
            let mut stmt = conn.prepare(&format!("SELECT * FROM {table}"))?;
            let column_count = stmt.column_count();
            let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
            let mut rows_json = Vec::new();
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut obj = serde_json::Map::new();
                for i in 0..column_count {
                    let value: rusqlite::types::Value = row.get(i)?;
                    let json_value = match value {
                        rusqlite::types::Value::Null => serde_json::Value::Null,
                        rusqlite::types::Value::Integer(n) => serde_json::Value::from(n),
                        rusqlite::types::Value::Real(f) => serde_json::Value::from(f),
                        rusqlite::types::Value::Text(s) => serde_json::Value::String(s),
                        rusqlite::types::Value::Blob(_) => serde_json::Value::Null,
                    };
                    obj.insert(column_names[i].clone(), json_value);
                }
                rows_json.push(serde_json::Value::Object(obj));
            }
            let path = dir.join(format!("{table}.json"));
            std::fs::write(path, serde_json::to_string_pretty(&rows_json)?)?;
        }
        Ok(())
    }

    /// Irreversibly wipes all table-backed entities. Used for GDPR
    /// delete-account requests and test teardown.
    pub fn wipe_all(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "DELETE FROM events; DELETE FROM contacts; DELETE FROM proposals;
             DELETE FROM observations; DELETE FROM preferences; DELETE FROM briefings;
             DELETE FROM memory_documents; DELETE FROM agent_sessions;
             DELETE FROM installed_skills; DELETE FROM chat_messages; DELETE FROM llm_calls;",
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn prune_removes_only_old_rows() {
        let store = Store::open_in_memory().unwrap();
        let old_ts = Utc::now() - chrono::Duration::days(400);
        store
            .insert_event("gmail", "email", "old", "", &Value::Null, None, Some(old_ts))
            .unwrap();
        store
            .insert_event("gmail", "email", "new", "", &Value::Null, None, None)
            .unwrap();
        let counts = store.prune(30, 30, 30).unwrap();
        assert_eq!(counts.events_pruned, 1);
    }

    #[test]
    fn wipe_all_clears_every_table() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_event("gmail", "email", "x", "", &Value::Null, None, None)
            .unwrap();
        store.wipe_all().unwrap();
        let remaining = store.query_events(None, None, None, None, 100, false).unwrap();
        assert!(remaining.is_empty());
    }
}
