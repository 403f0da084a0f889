use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::Store;

impl Store {
    pub fn set_preference(&self, key: &str, value: &Value, confidence: f32, learned_from: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO preferences (key, value, confidence, learned_from, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                confidence = excluded.confidence,
                learned_from = excluded.learned_from,
                updated_at = excluded.updated_at",
            params![key, serde_json::to_string(value)?, confidence, learned_from, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_preference(&self, key: &str, default: Value) -> Result<Value> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row("SELECT value FROM preferences WHERE key = ?1", params![key], |r| r.get(0))
            .optional()?;
        Ok(match raw {
            Some(raw) => serde_json::from_str(&raw)?,
            None => default,
        })
    }

    /// Returns `(value, confidence)`, or `None` when `key` has never been
    /// set. Lets callers (e.g. `PreferenceModel`) decide whether a new
    /// observation is confident enough to override the stored one.
    pub fn get_preference_with_confidence(&self, key: &str) -> Result<Option<(Value, f32)>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, f32)> = conn
            .query_row(
                "SELECT value, confidence FROM preferences WHERE key = ?1",
                params![key],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(match row {
            Some((raw, confidence)) => Some((serde_json::from_str(&raw)?, confidence)),
            None => None,
        })
    }

    pub fn all_preferences(&self) -> Result<HashMap<String, Value>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT key, value FROM preferences")?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let raw: String = row.get(1)?;
            Ok((key, raw))
        })?;
        let mut out = HashMap::new();
        for row in rows {
            let (key, raw) = row?;
            out.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_round_trips() {
        let store = Store::open_in_memory().unwrap();
        store.set_preference("theme", &Value::String("dark".into()), 1.0, "user").unwrap();
        let value = store.get_preference("theme", Value::Null).unwrap();
        assert_eq!(value, Value::String("dark".into()));
    }

    #[test]
    fn missing_key_returns_default() {
        let store = Store::open_in_memory().unwrap();
        let value = store.get_preference("missing", Value::Bool(false)).unwrap();
        assert_eq!(value, Value::Bool(false));
    }
}
