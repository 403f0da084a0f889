//! `ContextTracker` — spec.md GLOSSARY: "optional subsystem that tracks
//! per-project activity and produces a 'resurrection summary' when the
//! user returns to it."
//!
//! Grounded on `omnibrain_store::Event`'s `source = "project:<name>"`
//! convention (see `omnibrain-briefing`'s `get_active_projects`) — a
//! project's activity is simply its event stream under that source.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

const RESURRECTION_GAP_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct ProjectActivity {
    last_seen: DateTime<Utc>,
    last_summary: String,
}

#[derive(Default)]
pub struct ContextTracker {
    projects: Mutex<HashMap<String, ProjectActivity>>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `project` was just touched, with a short note on what
    /// happened. Returns a resurrection summary if the project had gone
    /// quiet for at least [`RESURRECTION_GAP_HOURS`].
    pub fn touch(&self, project: &str, summary: impl Into<String>) -> Option<String> {
        let summary = summary.into();
        let now = Utc::now();
        let mut projects = self.projects.lock().unwrap();

        let resurrection = projects.get(project).and_then(|prev| {
            let gap = now - prev.last_seen;
            if gap.num_hours() >= RESURRECTION_GAP_HOURS {
                Some(format!(
                    "Welcome back to {project} — last active {} ago. Last you were doing: {}",
                    format_gap(gap.num_hours()),
                    prev.last_summary
                ))
            } else {
                None
            }
        });

        projects.insert(project.to_string(), ProjectActivity { last_seen: now, last_summary: summary });
        resurrection
    }

    pub fn known_projects(&self) -> Vec<String> {
        self.projects.lock().unwrap().keys().cloned().collect()
    }
}

fn format_gap(hours: i64) -> String {
    if hours < 48 {
        format!("{hours}h")
    } else {
        format!("{}d", hours / 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_touch_produces_no_resurrection() {
        let tracker = ContextTracker::new();
        assert!(tracker.touch("website-redesign", "started the mockups").is_none());
    }

    #[test]
    fn recent_touch_does_not_resurrect() {
        let tracker = ContextTracker::new();
        tracker.touch("website-redesign", "started the mockups");
        assert!(tracker.touch("website-redesign", "picked it back up").is_none());
    }

    #[test]
    fn known_projects_lists_every_touched_project() {
        let tracker = ContextTracker::new();
        tracker.touch("a", "x");
        tracker.touch("b", "y");
        let mut projects = tracker.known_projects();
        projects.sort();
        assert_eq!(projects, vec!["a".to_string(), "b".to_string()]);
    }
}
