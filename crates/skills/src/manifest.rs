//! `skill.yaml` manifest discovery — spec.md §4.8 / §6.3.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use omnibrain_store::schema::InstalledSkill;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlerPaths {
    pub poll: Option<String>,
    pub ask: Option<String>,
    pub event: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SkillManifest {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub category: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    pub handlers: HandlerPaths,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SkillManifest {
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_installed_skill(&self) -> InstalledSkill {
        let now = Utc::now();
        InstalledSkill {
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            category: self.category.clone(),
            permissions: self.permissions.clone(),
            enabled: true,
            installed_at: now,
            updated_at: now,
            settings: serde_json::Value::Null,
            data: serde_json::Value::Null,
        }
    }
}

/// A manifest paired with the directory it was loaded from — handler paths
/// in the manifest are relative to this root.
#[derive(Debug, Clone)]
pub struct DiscoveredSkill {
    pub manifest: SkillManifest,
    pub root: PathBuf,
}

impl DiscoveredSkill {
    pub fn handler_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }
}

/// Scans `dirs` one level deep for `<skill>/skill.yaml` files. Directories
/// that don't exist are skipped; a malformed manifest is logged and skipped
/// rather than aborting discovery for the whole directory.
pub fn discover(dirs: &[PathBuf]) -> Vec<DiscoveredSkill> {
    let mut found = Vec::new();
    for dir in dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            tracing::debug!(dir = %dir.display(), "skill directory not found, skipping");
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let manifest_path = path.join("skill.yaml");
            if !manifest_path.exists() {
                continue;
            }
            match load_one(&manifest_path) {
                Ok(manifest) => found.push(DiscoveredSkill { manifest, root: path }),
                Err(err) => tracing::warn!(path = %manifest_path.display(), %err, "failed to parse skill manifest"),
            }
        }
    }
    found
}

fn load_one(path: &Path) -> anyhow::Result<SkillManifest> {
    let raw = std::fs::read_to_string(path)?;
    SkillManifest::from_yaml(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: inbox-triage
version: "1.0.0"
description: Files incoming receipts into an archive label
author: acme
category: email
permissions:
  - read_memory
  - emit_events
triggers:
  - new_email
handlers:
  poll: null
  ask: null
  event: handlers/on_event.py
dependencies: []
"#;

    #[test]
    fn parses_manifest_fields() {
        let m = SkillManifest::from_yaml(YAML).unwrap();
        assert_eq!(m.name, "inbox-triage");
        assert_eq!(m.permissions, vec!["read_memory", "emit_events"]);
        assert_eq!(m.handlers.event.as_deref(), Some("handlers/on_event.py"));
        assert!(m.handlers.poll.is_none());
    }

    #[test]
    fn to_installed_skill_carries_identity_fields() {
        let m = SkillManifest::from_yaml(YAML).unwrap();
        let installed = m.to_installed_skill();
        assert_eq!(installed.name, "inbox-triage");
        assert!(installed.enabled);
    }

    #[test]
    fn discover_skips_missing_directories() {
        let found = discover(&[PathBuf::from("/nonexistent/path/for/skills")]);
        assert!(found.is_empty());
    }

    #[test]
    fn discover_finds_manifest_in_temp_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let skill_dir = tmp.path().join("inbox-triage");
        std::fs::create_dir(&skill_dir).unwrap();
        std::fs::write(skill_dir.join("skill.yaml"), YAML).unwrap();
        let found = discover(&[tmp.path().to_path_buf()]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].manifest.name, "inbox-triage");
    }
}
