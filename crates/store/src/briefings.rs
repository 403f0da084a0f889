use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::schema::Briefing;
use crate::Store;

fn row_to_briefing(row: &rusqlite::Row) -> rusqlite::Result<Briefing> {
    Ok(Briefing {
        id: row.get("id")?,
        date: row.get::<_, String>("date")?.parse().unwrap_or_default(),
        briefing_type: row.get("briefing_type")?,
        content: row.get("content")?,
        events_processed: row.get("events_processed")?,
        actions_proposed: row.get("actions_proposed")?,
        generated_at: row.get::<_, String>("generated_at")?.parse().unwrap_or_else(|_| Utc::now()),
    })
}

impl Store {
    /// `(type, date)` is unique — re-generation replaces the row
    /// unconditionally (spec.md §3, Open Question resolved in DESIGN.md).
    pub fn insert_briefing(
        &self,
        briefing_type: &str,
        date: NaiveDate,
        content: &str,
        events_processed: i64,
        actions_proposed: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO briefings (date, briefing_type, content, events_processed, actions_proposed, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(briefing_type, date) DO UPDATE SET
                content = excluded.content,
                events_processed = excluded.events_processed,
                actions_proposed = excluded.actions_proposed,
                generated_at = excluded.generated_at",
            params![
                date.to_string(),
                briefing_type,
                content,
                events_processed,
                actions_proposed,
                Utc::now().to_rfc3339(),
            ],
        )?;
        conn.query_row(
            "SELECT id FROM briefings WHERE briefing_type = ?1 AND date = ?2",
            params![briefing_type, date.to_string()],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    pub fn latest_briefing(&self, briefing_type: &str) -> Result<Option<Briefing>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM briefings WHERE briefing_type = ?1 ORDER BY date DESC LIMIT 1",
            params![briefing_type],
            row_to_briefing,
        )
        .optional()
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_and_date_replaces_row_count_unchanged() {
        let store = Store::open_in_memory().unwrap();
        let date = Utc::now().date_naive();
        store.insert_briefing("morning", date, "v1", 1, 0).unwrap();
        store.insert_briefing("morning", date, "v2", 2, 1).unwrap();
        let conn = store.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM briefings", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
        drop(conn);
        let latest = store.latest_briefing("morning").unwrap().unwrap();
        assert_eq!(latest.content, "v2");
    }
}
