use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::schema::MemoryDocument;
use crate::Store;

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<MemoryDocument> {
    let contacts: String = row.get("contacts")?;
    let metadata: String = row.get("metadata")?;
    Ok(MemoryDocument {
        id: row.get("id")?,
        text: row.get("text")?,
        source: row.get("source")?,
        source_type: row.get("source_type")?,
        ts: row.get::<_, String>("ts")?.parse().unwrap_or_else(|_| Utc::now()),
        contacts: serde_json::from_str(&contacts).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata).unwrap_or(Value::Null),
        score: 0.0,
    })
}

/// Owned by `omnibrain-store`; `omnibrain-memory` is the only caller.
impl Store {
    pub fn upsert_memory_document(&self, doc: &MemoryDocument) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO memory_documents (id, text, source, source_type, ts, contacts, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                text = excluded.text, source = excluded.source, source_type = excluded.source_type,
                ts = excluded.ts, contacts = excluded.contacts, metadata = excluded.metadata",
            params![
                doc.id,
                doc.text,
                doc.source,
                doc.source_type,
                doc.ts.to_rfc3339(),
                serde_json::to_string(&doc.contacts)?,
                serde_json::to_string(&doc.metadata)?,
            ],
        )?;
        Ok(())
    }

    pub fn get_memory_document(&self, id: &str) -> Result<Option<MemoryDocument>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM memory_documents WHERE id = ?1", params![id], row_to_document)
            .optional()
            .map_err(Into::into)
    }

    pub fn delete_memory_document(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM memory_documents WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn count_memory_documents(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM memory_documents", [], |r| r.get(0))
            .map_err(Into::into)
    }

    pub fn recent_memory_documents(
        &self,
        limit: i64,
        source_filter: Option<&str>,
        since: Option<&str>,
    ) -> Result<Vec<MemoryDocument>> {
        let conn = self.conn.lock().unwrap();
        match (source_filter, since) {
            (Some(source), Some(since)) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM memory_documents WHERE source_type = ?1 AND ts >= ?2 ORDER BY ts DESC LIMIT ?3",
                )?;
                let rows = stmt.query_map(params![source, since, limit], row_to_document)?;
                Ok(rows.collect::<rusqlite::Result<_>>()?)
            }
            (Some(source), None) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM memory_documents WHERE source_type = ?1 ORDER BY ts DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![source, limit], row_to_document)?;
                Ok(rows.collect::<rusqlite::Result<_>>()?)
            }
            (None, Some(since)) => {
                let mut stmt =
                    conn.prepare("SELECT * FROM memory_documents WHERE ts >= ?1 ORDER BY ts DESC LIMIT ?2")?;
                let rows = stmt.query_map(params![since, limit], row_to_document)?;
                Ok(rows.collect::<rusqlite::Result<_>>()?)
            }
            (None, None) => {
                let mut stmt = conn.prepare("SELECT * FROM memory_documents ORDER BY ts DESC LIMIT ?1")?;
                let rows = stmt.query_map(params![limit], row_to_document)?;
                Ok(rows.collect::<rusqlite::Result<_>>()?)
            }
        }
    }

    /// FTS5 search over memory document text. `q` must already be a
    /// sanitized FTS5 MATCH expression. `since`, if given, is an RFC3339
    /// lower bound applied to `memory_documents.ts` (same cutoff style as
    /// `Store::prune`).
    pub fn fts_search_memory(&self, q: &str, limit: i64, since: Option<&str>) -> Result<Vec<MemoryDocument>> {
        if q.trim().is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        if let Some(since) = since {
            let mut stmt = conn.prepare(
                "SELECT memory_documents.* FROM memory_fts
                 JOIN memory_documents ON memory_documents.rowid = memory_fts.rowid
                 WHERE memory_fts MATCH ?1 AND memory_documents.ts >= ?2
                 ORDER BY rank
                 LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![q, since, limit], row_to_document)?;
            Ok(rows.collect::<rusqlite::Result<_>>()?)
        } else {
            let mut stmt = conn.prepare(
                "SELECT memory_documents.* FROM memory_fts
                 JOIN memory_documents ON memory_documents.rowid = memory_fts.rowid
                 WHERE memory_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![q, limit], row_to_document)?;
            Ok(rows.collect::<rusqlite::Result<_>>()?)
        }
    }
}
