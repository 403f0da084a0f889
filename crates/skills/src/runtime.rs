//! Discovery, trigger routing, and dispatch for installed skills —
//! spec.md §4.8.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use omnibrain_store::Store;

use crate::gateway::{PermissionGateway, SkillHost};
use crate::manifest::{discover, DiscoveredSkill};
use crate::process::{run_handler, HandlerError};

/// A poll trigger of the form `interval:<seconds>`. Any other trigger
/// string on a poll handler is treated as non-recurring (never fires on
/// its own — it's there to document intent, not to drive the scheduler).
fn parse_poll_interval(triggers: &[String]) -> Option<Duration> {
    triggers.iter().find_map(|t| {
        t.strip_prefix("interval:").and_then(|secs| secs.parse::<u64>().ok()).map(Duration::from_secs)
    })
}

pub struct SkillRuntime {
    store: Arc<Store>,
    skills_dirs: Vec<PathBuf>,
    host: Arc<dyn SkillHost>,
    skills: Mutex<Vec<DiscoveredSkill>>,
    last_poll: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SkillRuntime {
    pub fn new(store: Arc<Store>, skills_dirs: Vec<PathBuf>, host: Arc<dyn SkillHost>) -> Self {
        Self {
            store,
            skills_dirs,
            host,
            skills: Mutex::new(Vec::new()),
            last_poll: Mutex::new(HashMap::new()),
        }
    }

    /// Scans `skills_dirs` for manifests and registers each with the store
    /// if not already present. Safe to call repeatedly (e.g. on startup and
    /// on a periodic reload).
    pub fn discover_and_register(&self) -> anyhow::Result<usize> {
        let found = discover(&self.skills_dirs);
        let mut registered = 0;
        for skill in &found {
            if self.store.register_skill_if_absent(&skill.manifest.to_installed_skill())? {
                registered += 1;
            }
        }
        *self.skills.lock().unwrap() = found;
        Ok(registered)
    }

    fn gateway_for(&self, skill_name: &str) -> anyhow::Result<PermissionGateway> {
        let permissions = self
            .store
            .get_skill(skill_name)?
            .map(|s| s.permissions)
            .unwrap_or_default();
        Ok(PermissionGateway::new(&permissions))
    }

    /// Runs every enabled poll handler whose interval has elapsed since its
    /// last run. Returns one entry per invocation attempted.
    pub async fn run_poll_due(&self, now: DateTime<Utc>) -> Vec<(String, Result<Value, HandlerError>)> {
        let due: Vec<DiscoveredSkill> = {
            let skills = self.skills.lock().unwrap();
            let last_poll = self.last_poll.lock().unwrap();
            skills
                .iter()
                .filter(|s| s.manifest.handlers.poll.is_some())
                .filter(|s| {
                    let Some(interval) = parse_poll_interval(&s.manifest.triggers) else { return false };
                    match last_poll.get(&s.manifest.name) {
                        None => true,
                        Some(last) => (now - *last).to_std().unwrap_or(Duration::ZERO) >= interval,
                    }
                })
                .cloned()
                .collect()
        };

        let mut results = Vec::new();
        for skill in due {
            let handler = skill.manifest.handlers.poll.clone().expect("filtered above");
            let outcome = self.invoke(&skill, &handler, Value::Null).await;
            self.last_poll.lock().unwrap().insert(skill.manifest.name.clone(), now);
            results.push((skill.manifest.name.clone(), outcome));
        }
        results
    }

    /// Dispatches `topic`/`payload` to every skill whose manifest lists
    /// `topic` among its triggers and declares an event handler.
    pub async fn dispatch_event(&self, topic: &str, payload: Value) -> Vec<(String, Result<Value, HandlerError>)> {
        let matching: Vec<DiscoveredSkill> = {
            let skills = self.skills.lock().unwrap();
            skills
                .iter()
                .filter(|s| s.manifest.handlers.event.is_some())
                .filter(|s| s.manifest.triggers.iter().any(|t| t == topic))
                .cloned()
                .collect()
        };

        let mut results = Vec::new();
        for skill in matching {
            let handler = skill.manifest.handlers.event.clone().expect("filtered above");
            let outcome = self.invoke(&skill, &handler, payload.clone()).await;
            results.push((skill.manifest.name.clone(), outcome));
        }
        results
    }

    /// Tries every skill with an `ask` handler against `message`, matched
    /// by a substring heuristic against the skill's triggers, returning the
    /// first successful handler's result to be injected into chat context.
    pub async fn dispatch_ask(&self, message: &str) -> Option<(String, Value)> {
        let lower = message.to_lowercase();
        let matching: Vec<DiscoveredSkill> = {
            let skills = self.skills.lock().unwrap();
            skills
                .iter()
                .filter(|s| s.manifest.handlers.ask.is_some())
                .filter(|s| s.manifest.triggers.iter().any(|t| lower.contains(&t.to_lowercase())))
                .cloned()
                .collect()
        };

        for skill in matching {
            let handler = skill.manifest.handlers.ask.clone().expect("filtered above");
            let args = serde_json::json!({ "message": message });
            if let Ok(value) = self.invoke(&skill, &handler, args).await {
                return Some((skill.manifest.name.clone(), value));
            }
        }
        None
    }

    async fn invoke(&self, skill: &DiscoveredSkill, handler_relpath: &str, args: Value) -> Result<Value, HandlerError> {
        let gateway = self
            .gateway_for(&skill.manifest.name)
            .unwrap_or_else(|_| PermissionGateway::new(&[]));
        let handler_path = skill.handler_path(handler_relpath);
        run_handler(&handler_path, &skill.root, &args, &gateway, self.host.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interval_trigger() {
        let d = parse_poll_interval(&["interval:300".to_string()]);
        assert_eq!(d, Some(Duration::from_secs(300)));
    }

    #[test]
    fn non_interval_triggers_never_poll() {
        assert_eq!(parse_poll_interval(&["new_email".to_string()]), None);
    }
}
