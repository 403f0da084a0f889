use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::error::Result;
use crate::schema::{Contact, Relationship};
use crate::Store;

fn row_to_contact(row: &rusqlite::Row) -> rusqlite::Result<Contact> {
    let last_interaction: Option<String> = row.get("last_interaction")?;
    Ok(Contact {
        email: row.get("email")?,
        name: row.get("name")?,
        relationship: Relationship::from_str(&row.get::<_, String>("relationship")?),
        organization: row.get("organization")?,
        last_interaction: last_interaction.and_then(|s| s.parse().ok()),
        interaction_count: row.get("interaction_count")?,
        avg_response_time_hours: row.get("avg_response_time_hours")?,
        notes: row.get("notes")?,
    })
}

impl Store {
    /// Upsert a contact. COALESCE-merges `name`/`organization`/`notes`;
    /// `relationship` only overwrites the existing value if the incoming
    /// one is not `unknown`; `interaction_count` always increments by 1.
    pub fn upsert_contact(&self, contact: &Contact) -> Result<Contact> {
        let conn = self.conn.lock().unwrap();
        let incoming_relationship = if contact.relationship == Relationship::Unknown {
            None
        } else {
            Some(contact.relationship.as_str())
        };
        conn.execute(
            "INSERT INTO contacts (email, name, relationship, organization, last_interaction, interaction_count, avg_response_time_hours, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)
             ON CONFLICT(email) DO UPDATE SET
                name = COALESCE(excluded.name, contacts.name),
                relationship = COALESCE(?8, contacts.relationship),
                organization = COALESCE(excluded.organization, contacts.organization),
                last_interaction = excluded.last_interaction,
                interaction_count = contacts.interaction_count + 1,
                avg_response_time_hours = excluded.avg_response_time_hours,
                notes = COALESCE(excluded.notes, contacts.notes)",
            params![
                contact.email,
                contact.name,
                contact.relationship.as_str(),
                contact.organization,
                contact.last_interaction.map(|t| t.to_rfc3339()).unwrap_or_else(|| Utc::now().to_rfc3339()),
                contact.avg_response_time_hours,
                contact.notes,
                incoming_relationship,
            ],
        )?;
        conn.query_row(
            "SELECT * FROM contacts WHERE email = ?1",
            params![contact.email],
            row_to_contact,
        )
        .map_err(Into::into)
    }

    pub fn upsert_contact_by_name(
        &self,
        name: &str,
        relationship: Relationship,
        notes: Option<&str>,
    ) -> Result<Contact> {
        let email = Contact::synthetic_email(name);
        self.upsert_contact(&Contact {
            email,
            name: name.to_string(),
            relationship,
            organization: None,
            last_interaction: Some(Utc::now()),
            interaction_count: 0,
            avg_response_time_hours: 0.0,
            notes: notes.map(str::to_string),
        })
    }

    pub fn get_contact(&self, email: &str) -> Result<Option<Contact>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM contacts WHERE email = ?1", params![email], row_to_contact)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_contacts(&self, limit: i64) -> Result<Vec<Contact>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM contacts ORDER BY interaction_count DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], row_to_contact)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn list_vip_contacts(&self) -> Result<Vec<Contact>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM contacts WHERE interaction_count >= 10 AND avg_response_time_hours < 4.0
             ORDER BY interaction_count DESC",
        )?;
        let rows = stmt.query_map([], row_to_contact)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(email: &str, count: i64, avg_hours: f64) -> Contact {
        Contact {
            email: email.to_string(),
            name: "Ada".to_string(),
            relationship: Relationship::Client,
            organization: None,
            last_interaction: Some(Utc::now()),
            interaction_count: count,
            avg_response_time_hours: avg_hours,
            notes: None,
        }
    }

    #[test]
    fn upsert_merges_and_increments_interaction_count() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_contact(&sample("a@x.com", 0, 3.0)).unwrap();
        let result = store.upsert_contact(&sample("a@x.com", 0, 2.0)).unwrap();
        assert_eq!(result.interaction_count, 2);
    }

    #[test]
    fn vip_is_interaction_count_and_response_time_gated() {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..11 {
            store.upsert_contact(&sample("vip@x.com", 0, 1.0)).unwrap();
        }
        let vips = store.list_vip_contacts().unwrap();
        assert_eq!(vips.len(), 1);
        assert!(vips[0].is_vip());
    }
}
