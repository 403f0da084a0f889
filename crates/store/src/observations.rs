use chrono::Utc;
use rusqlite::params;

use crate::error::Result;
use crate::schema::Observation;
use crate::Store;

fn row_to_observation(row: &rusqlite::Row) -> rusqlite::Result<Observation> {
    Ok(Observation {
        id: row.get("id")?,
        ts: row.get::<_, String>("ts")?.parse().unwrap_or_else(|_| Utc::now()),
        pattern_type: row.get("pattern_type")?,
        description: row.get("description")?,
        frequency: row.get("frequency")?,
        last_seen: row.get::<_, String>("last_seen")?.parse().unwrap_or_else(|_| Utc::now()),
        confidence: row.get("confidence")?,
        promoted_to_automation: row.get::<_, i64>("promoted_to_automation")? != 0,
    })
}

impl Store {
    pub fn insert_observation(
        &self,
        pattern_type: &str,
        description: &str,
        confidence: f32,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO observations (ts, pattern_type, description, frequency, last_seen, confidence, promoted_to_automation)
             VALUES (?1, ?2, ?3, 1, ?1, ?4, 0)",
            params![now, pattern_type, description, confidence],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_observations(
        &self,
        pattern_type: Option<&str>,
        min_confidence: f32,
        days: i64,
    ) -> Result<Vec<Observation>> {
        let conn = self.conn.lock().unwrap();
        let since = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let (sql, use_type) = if pattern_type.is_some() {
            (
                "SELECT * FROM observations WHERE pattern_type = ?1 AND confidence >= ?2 AND ts >= ?3 ORDER BY ts DESC",
                true,
            )
        } else {
            (
                "SELECT * FROM observations WHERE confidence >= ?2 AND ts >= ?3 ORDER BY ts DESC",
                false,
            )
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = if use_type {
            stmt.query_map(params![pattern_type.unwrap(), min_confidence, since], row_to_observation)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map(params![min_confidence, since], row_to_observation)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    pub fn promote_observation(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE observations SET promoted_to_automation = 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(())
    }

    pub fn promote_observations(&self, ids: &[i64]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for id in ids {
            conn.execute(
                "UPDATE observations SET promoted_to_automation = 1 WHERE id = ?1",
                params![id],
            )?;
        }
        Ok(())
    }
}
