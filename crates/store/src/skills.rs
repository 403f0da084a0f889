use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

use crate::error::Result;
use crate::schema::InstalledSkill;
use crate::Store;

fn row_to_skill(row: &rusqlite::Row) -> rusqlite::Result<InstalledSkill> {
    Ok(InstalledSkill {
        name: row.get("name")?,
        version: row.get("version")?,
        description: row.get("description")?,
        author: row.get("author")?,
        category: row.get("category")?,
        permissions: serde_json::from_str(&row.get::<_, String>("permissions")?).unwrap_or_default(),
        enabled: row.get::<_, i64>("enabled")? != 0,
        installed_at: row.get::<_, String>("installed_at")?.parse().unwrap_or_else(|_| Utc::now()),
        updated_at: row.get::<_, String>("updated_at")?.parse().unwrap_or_else(|_| Utc::now()),
        settings: serde_json::from_str(&row.get::<_, String>("settings")?).unwrap_or(Value::Null),
        data: serde_json::from_str(&row.get::<_, String>("data")?).unwrap_or(Value::Null),
    })
}

impl Store {
    pub fn register_skill_if_absent(&self, skill: &InstalledSkill) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "INSERT OR IGNORE INTO installed_skills (name, version, description, author, category, permissions, enabled, installed_at, updated_at, settings, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                skill.name,
                skill.version,
                skill.description,
                skill.author,
                skill.category,
                serde_json::to_string(&skill.permissions)?,
                skill.enabled as i64,
                skill.installed_at.to_rfc3339(),
                skill.updated_at.to_rfc3339(),
                serde_json::to_string(&skill.settings)?,
                serde_json::to_string(&skill.data)?,
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn get_skill(&self, name: &str) -> Result<Option<InstalledSkill>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM installed_skills WHERE name = ?1", params![name], row_to_skill)
            .optional()
            .map_err(Into::into)
    }

    pub fn list_skills(&self) -> Result<Vec<InstalledSkill>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM installed_skills ORDER BY name")?;
        let rows = stmt.query_map([], row_to_skill)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn set_skill_enabled(&self, name: &str, enabled: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE installed_skills SET enabled = ?1, updated_at = ?2 WHERE name = ?3",
            params![enabled as i64, Utc::now().to_rfc3339(), name],
        )?;
        Ok(())
    }

    pub fn delete_skill(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM installed_skills WHERE name = ?1", params![name])?;
        Ok(())
    }
}
