use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::schema::Event;
use crate::Store;

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<Event> {
    let metadata_raw: String = row.get("metadata")?;
    Ok(Event {
        id: row.get("id")?,
        ts: row.get::<_, String>("ts")?.parse().unwrap_or_else(|_| Utc::now()),
        source: row.get("source")?,
        event_type: row.get("event_type")?,
        title: row.get("title")?,
        body: row.get("body")?,
        metadata: serde_json::from_str(&metadata_raw).unwrap_or(Value::Null),
        priority: row.get("priority")?,
        processed: row.get::<_, i64>("processed")? != 0,
    })
}

impl Store {
    /// Insert an event. `(source, event_type, title, ts)` uniquely
    /// identifies a row; a conflicting insert replaces the existing row
    /// (spec.md §3/§4.1 invariant c).
    pub fn insert_event(
        &self,
        source: &str,
        event_type: &str,
        title: &str,
        body: &str,
        metadata: &Value,
        priority: Option<&str>,
        ts: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let ts = ts.unwrap_or_else(Utc::now);
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO events (ts, source, event_type, title, body, metadata, priority, processed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)
             ON CONFLICT(source, event_type, title, ts) DO UPDATE SET
                body = excluded.body,
                metadata = excluded.metadata,
                priority = excluded.priority",
            params![
                ts.to_rfc3339(),
                source,
                event_type,
                title,
                body,
                serde_json::to_string(metadata)?,
                priority,
            ],
        )?;
        let id: i64 = tx.query_row(
            "SELECT id FROM events WHERE source = ?1 AND event_type = ?2 AND title = ?3 AND ts = ?4",
            params![source, event_type, title, ts.to_rfc3339()],
            |row| row.get(0),
        )?;
        tx.commit()?;
        Ok(id)
    }

    pub fn query_events(
        &self,
        source: Option<&str>,
        event_type: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
        unprocessed_only: bool,
    ) -> Result<Vec<Event>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from("SELECT * FROM events WHERE 1=1");
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(s) = source {
            sql.push_str(" AND source = ?");
            args.push(Box::new(s.to_string()));
        }
        if let Some(t) = event_type {
            sql.push_str(" AND event_type = ?");
            args.push(Box::new(t.to_string()));
        }
        if let Some(since) = since {
            sql.push_str(" AND ts >= ?");
            args.push(Box::new(since.to_rfc3339()));
        }
        if let Some(until) = until {
            sql.push_str(" AND ts <= ?");
            args.push(Box::new(until.to_rfc3339()));
        }
        if unprocessed_only {
            sql.push_str(" AND processed = 0");
        }
        sql.push_str(" ORDER BY ts DESC LIMIT ?");
        args.push(Box::new(limit));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn mark_event_processed(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE events SET processed = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn get_event(&self, id: i64) -> Result<Option<Event>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM events WHERE id = ?1", params![id], row_to_event)
            .optional()
            .map_err(Into::into)
    }

    /// Full-text search over `(title, body, metadata)`. Sanitization of
    /// `q` is the caller's responsibility (`omnibrain-memory::fts_query`);
    /// this method assumes `q` is already a valid FTS5 MATCH expression.
    pub fn fts_search_events(&self, q: &str, limit: i64) -> Result<Vec<Event>> {
        if q.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT events.* FROM events_fts
             JOIN events ON events.id = events_fts.rowid
             WHERE events_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![q, limit], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[test]
    fn insert_then_fts_search_finds_event() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_event(
                "gmail",
                "email",
                "Quarterly report",
                "see attached",
                &Value::Null,
                None,
                None,
            )
            .unwrap();
        let found = store.fts_search_events("quarterly", 10).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Quarterly report");
    }

    #[test]
    fn conflicting_insert_replaces_row() {
        let store = Store::open_in_memory().unwrap();
        let ts = Utc::now();
        store
            .insert_event("gmail", "email", "Hi", "v1", &Value::Null, None, Some(ts))
            .unwrap();
        store
            .insert_event("gmail", "email", "Hi", "v2", &Value::Null, None, Some(ts))
            .unwrap();
        let all = store.query_events(Some("gmail"), None, None, None, 10, false).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].body, "v2");
    }

    #[test]
    fn processed_only_event_field_mutates() {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_event("gmail", "email", "X", "y", &Value::Null, None, None)
            .unwrap();
        store.mark_event_processed(id).unwrap();
        let event = store.get_event(id).unwrap().unwrap();
        assert!(event.processed);
        assert_eq!(event.title, "X");
    }
}
