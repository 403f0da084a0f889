use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;

use crate::error::Result;
use crate::schema::{Proposal, ProposalStatus};
use crate::Store;

fn row_to_proposal(row: &rusqlite::Row) -> rusqlite::Result<Proposal> {
    let action_data: String = row.get("action_data")?;
    let expires_at: Option<String> = row.get("expires_at")?;
    let snoozed_until: Option<String> = row.get("snoozed_until")?;
    Ok(Proposal {
        id: row.get("id")?,
        created_at: row.get::<_, String>("created_at")?.parse().unwrap_or_else(|_| Utc::now()),
        proposal_type: row.get("proposal_type")?,
        title: row.get("title")?,
        description: row.get("description")?,
        action_data: serde_json::from_str(&action_data).unwrap_or(Value::Null),
        status: ProposalStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(ProposalStatus::Pending),
        priority: row.get::<_, i64>("priority")? as u8,
        expires_at: expires_at.and_then(|s| s.parse().ok()),
        result: row.get("result")?,
        snoozed_until: snoozed_until.and_then(|s| s.parse().ok()),
    })
}

impl Store {
    #[allow(clippy::too_many_arguments)]
    pub fn insert_proposal(
        &self,
        proposal_type: &str,
        title: &str,
        description: &str,
        action_data: &Value,
        priority: u8,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO proposals (created_at, proposal_type, title, description, action_data, status, priority, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)",
            params![
                Utc::now().to_rfc3339(),
                proposal_type,
                title,
                description,
                serde_json::to_string(action_data)?,
                priority,
                expires_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Ordered `(priority DESC, created_at ASC)` per spec.md §4.1.
    pub fn list_pending_proposals(&self) -> Result<Vec<Proposal>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM proposals WHERE status = 'pending'
             ORDER BY priority DESC, created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_proposal)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// All proposals created on or after `since`, newest first. Used by
    /// the review engine to derive day/week stats from `created_at` and
    /// current `status` rather than a separate transition log.
    pub fn list_proposals_since(&self, since: DateTime<Utc>) -> Result<Vec<Proposal>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM proposals WHERE created_at >= ?1 ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map(params![since.to_rfc3339()], row_to_proposal)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn update_proposal_status(
        &self,
        id: i64,
        status: ProposalStatus,
        result: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE proposals SET status = ?1, result = COALESCE(?2, result) WHERE id = ?3",
            params![status.as_str(), result, id],
        )?;
        Ok(())
    }

    pub fn snooze_proposal(&self, id: i64, until: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE proposals SET status = 'snoozed', snoozed_until = ?1 WHERE id = ?2",
            params![until.to_rfc3339(), id],
        )?;
        Ok(())
    }

    pub fn unsnooze_due_proposals(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE proposals SET status = 'pending', snoozed_until = NULL
             WHERE status = 'snoozed' AND snoozed_until <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(count)
    }

    /// Sets `pending -> expired` where `expires_at < now`. Returns the
    /// number of rows updated.
    pub fn expire_old_proposals(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let count = conn.execute(
            "UPDATE proposals SET status = 'expired'
             WHERE status = 'pending' AND expires_at IS NOT NULL AND expires_at < ?1",
            params![now],
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_proposals_transition_and_are_idempotent() {
        let store = Store::open_in_memory().unwrap();
        let past = Utc::now() - chrono::Duration::hours(1);
        let id = store
            .insert_proposal("reminder", "Reply", "", &Value::Null, 3, Some(past))
            .unwrap();
        let count = store.expire_old_proposals().unwrap();
        assert_eq!(count, 1);
        let again = store.expire_old_proposals().unwrap();
        assert_eq!(again, 0);
        let conn = store.conn.lock().unwrap();
        let status: String = conn
            .query_row("SELECT status FROM proposals WHERE id = ?1", params![id], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "expired");
    }

    #[test]
    fn pending_list_orders_by_priority_then_age() {
        let store = Store::open_in_memory().unwrap();
        store.insert_proposal("a", "Low", "", &Value::Null, 1, None).unwrap();
        store.insert_proposal("b", "High", "", &Value::Null, 4, None).unwrap();
        let pending = store.list_pending_proposals().unwrap();
        assert_eq!(pending[0].title, "High");
    }

    #[test]
    fn approve_empties_pending_list() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_proposal("a", "Reply", "", &Value::Null, 3, None).unwrap();
        store.update_proposal_status(id, ProposalStatus::Approved, None).unwrap();
        assert!(store.list_pending_proposals().unwrap().is_empty());
    }
}
