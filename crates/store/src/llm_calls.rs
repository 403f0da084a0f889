use chrono::Utc;
use rusqlite::params;

use crate::error::Result;
use crate::schema::LlmCallRecord;
use crate::Store;

fn row_to_call(row: &rusqlite::Row) -> rusqlite::Result<LlmCallRecord> {
    Ok(LlmCallRecord {
        id: row.get("id")?,
        ts: row.get::<_, String>("ts")?.parse().unwrap_or_else(|_| Utc::now()),
        provider: row.get("provider")?,
        model: row.get("model")?,
        prompt_hash: row.get("prompt_hash")?,
        prompt_preview: row.get("prompt_preview")?,
        prompt_size: row.get("prompt_size")?,
        response_size: row.get("response_size")?,
        input_tokens: row.get("input_tokens")?,
        output_tokens: row.get("output_tokens")?,
        cache_read_tokens: row.get("cache_read_tokens")?,
        cache_creation_tokens: row.get("cache_creation_tokens")?,
        cost_estimate: row.get("cost_estimate")?,
        source: row.get("source")?,
        duration_ms: row.get("duration_ms")?,
        success: row.get::<_, i64>("success")? != 0,
        error_message: row.get("error_message")?,
    })
}

impl Store {
    pub fn insert_llm_call(&self, record: &LlmCallRecord) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO llm_calls (ts, provider, model, prompt_hash, prompt_preview, prompt_size, response_size,
                input_tokens, output_tokens, cache_read_tokens, cache_creation_tokens, cost_estimate, source,
                duration_ms, success, error_message)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
            params![
                record.ts.to_rfc3339(),
                record.provider,
                record.model,
                record.prompt_hash,
                record.prompt_preview,
                record.prompt_size,
                record.response_size,
                record.input_tokens,
                record.output_tokens,
                record.cache_read_tokens,
                record.cache_creation_tokens,
                record.cost_estimate,
                record.source,
                record.duration_ms,
                record.success as i64,
                record.error_message,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_llm_calls(
        &self,
        provider: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LlmCallRecord>> {
        let conn = self.conn.lock().unwrap();
        if let Some(provider) = provider {
            let mut stmt = conn.prepare(
                "SELECT * FROM llm_calls WHERE provider = ?1 ORDER BY ts DESC LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(params![provider, limit, offset], row_to_call)?;
            Ok(rows.collect::<rusqlite::Result<_>>()?)
        } else {
            let mut stmt = conn.prepare("SELECT * FROM llm_calls ORDER BY ts DESC LIMIT ?1 OFFSET ?2")?;
            let rows = stmt.query_map(params![limit, offset], row_to_call)?;
            Ok(rows.collect::<rusqlite::Result<_>>()?)
        }
    }

    pub fn prune_llm_calls(&self, days: i64) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        let count = conn.execute("DELETE FROM llm_calls WHERE ts < ?1", params![cutoff])?;
        Ok(count)
    }
}
