//! Recurring-behavior detection and automation proposals — spec.md §4.4.
//!
//! Holds no state between `detect()` calls beyond a cache of the last
//! result, the way `crates/memory`'s sleep-cycle consolidation keeps no
//! state beyond its last summary.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use omnibrain_store::schema::Observation;
use omnibrain_store::Store;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{1,2}:\d{2}\b").unwrap());
static ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9a-fA-F]{6,}").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_type: String,
    pub description: String,
    pub occurrences: usize,
    pub avg_confidence: f32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub observation_ids: Vec<i64>,
}

impl DetectedPattern {
    /// `min(occurrences / 10, 1.0) * avg_confidence` — ten occurrences
    /// saturate the frequency term regardless of confidence.
    pub fn strength(&self) -> f32 {
        (self.occurrences as f32 / 10.0).min(1.0) * self.avg_confidence
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationProposal {
    pub pattern: DetectedPattern,
    pub action_type: String,
    pub title: String,
    pub description: String,
    pub trigger: String,
}

/// Normalizes a description for clustering: lowercases, collapses
/// whitespace, replaces `HH:MM`-shaped substrings and 6+ char hex/digit
/// runs so that otherwise-identical observations with different
/// timestamps or ids cluster together.
pub fn normalize(text: &str) -> String {
    let collapsed = WS_RE.replace_all(text.trim(), " ").to_lowercase();
    let with_times = TIME_RE.replace_all(&collapsed, "HH:MM");
    ID_RE.replace_all(&with_times, "ID").into_owned()
}

/// Jaccard similarity over whitespace-split word sets.
pub fn word_overlap(a: &str, b: &str) -> f32 {
    let set_a: std::collections::HashSet<&str> = a.split_whitespace().collect();
    let set_b: std::collections::HashSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

#[derive(Debug, Clone)]
struct ObsRef {
    id: i64,
    description: String,
}

/// Greedy single-pass clustering: an observation joins the first cluster
/// whose representative (its first member) has word-overlap >= threshold
/// against its normalized description.
fn cluster_observations(obs: &[ObsRef], threshold: f32) -> Vec<Vec<ObsRef>> {
    let mut clusters: Vec<(String, Vec<ObsRef>)> = Vec::new();
    for o in obs {
        let normalized = normalize(&o.description);
        let mut placed = false;
        for (representative, members) in clusters.iter_mut() {
            if word_overlap(representative, &normalized) >= threshold {
                members.push(o.clone());
                placed = true;
                break;
            }
        }
        if !placed {
            clusters.push((normalized, vec![o.clone()]));
        }
    }
    clusters.into_iter().map(|(_, members)| members).collect()
}

/// Classifies a raw action name and context into a pattern type. Order
/// matters: routing and calendar keywords are checked before the
/// broader communication-pattern keywords so e.g. `archive_email`
/// resolves to `email_routing`, not `communication_pattern`.
pub fn classify_action(action_type: &str, context: &serde_json::Value) -> String {
    let lower = action_type.to_lowercase();
    if lower.contains("archive") || lower.contains("label") {
        return "email_routing".to_string();
    }
    if lower.contains("meeting") || lower.contains("schedule") || lower.contains("calendar") {
        return "calendar_habit".to_string();
    }
    if lower.contains("email") || lower.contains("send") || lower.contains("reply") || lower.contains("draft") {
        return "communication_pattern".to_string();
    }
    if lower.contains("search") || lower.contains("find") || lower.contains("lookup") {
        return "recurring_search".to_string();
    }
    if context.get("time_of_day").is_some() {
        return "time_pattern".to_string();
    }
    if context.get("after_action").is_some() {
        return "action_sequence".to_string();
    }
    "general_pattern".to_string()
}

fn describe_action(action_type: &str, context: &serde_json::Value) -> String {
    let base = action_type.replace('_', " ");
    if let Some(recipient) = context.get("recipient").and_then(|v| v.as_str()) {
        return format!("{base} to {recipient}");
    }
    if let Some(subject) = context.get("subject").and_then(|v| v.as_str()) {
        return format!("{base}: {subject}");
    }
    base
}

fn build_automation_proposal(pattern: &DetectedPattern) -> Option<AutomationProposal> {
    let (action_type, trigger): (&str, &str) = match pattern.pattern_type.as_str() {
        "email_routing" => ("auto_route_email", "on_email_received"),
        "communication_pattern" => ("auto_draft_reply", "on_email_received"),
        "recurring_search" => ("scheduled_search", "on_schedule"),
        "time_pattern" => ("scheduled_task", "on_schedule"),
        "calendar_habit" => ("calendar_automation", "on_event_created"),
        "action_sequence" => ("action_chain", "after_prior_action"),
        _ => return None,
    };
    Some(AutomationProposal {
        title: format!("Automate: {}", pattern.description),
        description: format!(
            "Detected {} occurrences of this pattern (confidence {:.0}%). Automate it?",
            pattern.occurrences,
            pattern.avg_confidence * 100.0
        ),
        action_type: action_type.to_string(),
        trigger: trigger.to_string(),
        pattern: pattern.clone(),
    })
}

pub struct PatternDetector {
    store: Arc<Store>,
    min_occurrences: usize,
    confidence_threshold: f32,
    strong_threshold: f32,
    cluster_threshold: f32,
    last_detected: Mutex<Vec<DetectedPattern>>,
}

impl PatternDetector {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            min_occurrences: 3,
            confidence_threshold: 0.5,
            strong_threshold: 0.2,
            cluster_threshold: 0.6,
            last_detected: Mutex::new(Vec::new()),
        }
    }

    pub fn with_thresholds(mut self, min_occurrences: usize, confidence_threshold: f32) -> Self {
        self.min_occurrences = min_occurrences;
        self.confidence_threshold = confidence_threshold;
        self
    }

    pub fn observe(
        &self,
        pattern_type: &str,
        description: &str,
        confidence: f32,
        _evidence: Option<&str>,
    ) -> anyhow::Result<i64> {
        Ok(self.store.insert_observation(pattern_type, description, confidence)?)
    }

    pub fn observe_action(&self, action_type: &str, context: serde_json::Value) -> anyhow::Result<i64> {
        let pattern_type = classify_action(action_type, &context);
        let description = describe_action(action_type, &context);
        self.observe(&pattern_type, &description, 0.7, None)
    }

    pub fn detect(&self, min_occurrences: usize, confidence_threshold: f32, days: i64) -> anyhow::Result<Vec<DetectedPattern>> {
        let observations = self.store.list_observations(None, 0.0, days)?;

        let mut by_type: HashMap<String, Vec<Observation>> = HashMap::new();
        for obs in observations {
            by_type.entry(obs.pattern_type.clone()).or_default().push(obs);
        }

        let mut patterns = Vec::new();
        for (pattern_type, obs_list) in by_type {
            let refs: Vec<ObsRef> = obs_list
                .iter()
                .map(|o| ObsRef {
                    id: o.id,
                    description: o.description.clone(),
                })
                .collect();
            let clusters = cluster_observations(&refs, self.cluster_threshold);

            for cluster in clusters {
                if cluster.len() < min_occurrences {
                    continue;
                }
                let members: Vec<&Observation> = cluster
                    .iter()
                    .filter_map(|c| obs_list.iter().find(|o| o.id == c.id))
                    .collect();
                let mean_confidence =
                    members.iter().map(|o| o.confidence).sum::<f32>() / members.len() as f32;
                if mean_confidence < confidence_threshold {
                    continue;
                }
                let first_seen = members.iter().map(|o| o.ts).min().unwrap();
                let last_seen = members.iter().map(|o| o.ts).max().unwrap();
                let description = members
                    .iter()
                    .max_by_key(|o| o.description.len())
                    .map(|o| o.description.clone())
                    .unwrap_or_default();
                patterns.push(DetectedPattern {
                    pattern_type: pattern_type.clone(),
                    description,
                    occurrences: members.len(),
                    avg_confidence: mean_confidence,
                    first_seen,
                    last_seen,
                    observation_ids: members.iter().map(|o| o.id).collect(),
                });
            }
        }

        patterns.sort_by(|a, b| b.strength().partial_cmp(&a.strength()).unwrap_or(std::cmp::Ordering::Equal));
        *self.last_detected.lock().unwrap() = patterns.clone();
        Ok(patterns)
    }

    pub fn detect_defaults(&self) -> anyhow::Result<Vec<DetectedPattern>> {
        self.detect(self.min_occurrences, self.confidence_threshold, 30)
    }

    pub fn get_patterns(&self) -> Vec<DetectedPattern> {
        self.last_detected.lock().unwrap().clone()
    }

    pub fn get_strong_patterns(&self) -> Vec<DetectedPattern> {
        self.last_detected
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.strength() >= self.strong_threshold)
            .cloned()
            .collect()
    }

    pub fn propose_automations(&self) -> Vec<AutomationProposal> {
        self.get_strong_patterns()
            .iter()
            .filter_map(build_automation_proposal)
            .collect()
    }

    pub fn promote_pattern(&self, pattern: &DetectedPattern) -> anyhow::Result<()> {
        self.store.promote_observations(&pattern.observation_ids)?;
        Ok(())
    }

    pub fn summary(&self) -> anyhow::Result<serde_json::Value> {
        let total_observations = self.store.list_observations(None, 0.0, 30)?.len();
        let detected = self.last_detected.lock().unwrap();
        Ok(serde_json::json!({
            "total_observations": total_observations,
            "detected_patterns": detected.len(),
        }))
    }

    pub fn weekly_analysis(&self) -> anyhow::Result<serde_json::Value> {
        let patterns = self.detect_defaults()?;
        let proposals = self.propose_automations();
        let top_patterns: Vec<&DetectedPattern> = patterns.iter().take(5).collect();
        Ok(serde_json::json!({
            "patterns_detected": patterns.len(),
            "automations_proposed": proposals.len(),
            "top_patterns": top_patterns,
            "proposals": proposals,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> PatternDetector {
        PatternDetector::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    #[test]
    fn strength_scales_with_occurrences_and_confidence() {
        let low = DetectedPattern {
            pattern_type: "time_pattern".into(),
            description: "x".into(),
            occurrences: 1,
            avg_confidence: 0.8,
            first_seen: Utc::now(),
            last_seen: Utc::now(),
            observation_ids: vec![],
        };
        assert!((low.strength() - 0.08).abs() < 1e-6);

        let capped = DetectedPattern {
            occurrences: 20,
            avg_confidence: 0.9,
            ..low.clone()
        };
        assert!((capped.strength() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn normalize_replaces_times_and_ids() {
        assert_eq!(normalize("  Hello   World  "), "hello world");
        assert!(normalize("reads email at 09:00").contains("HH:MM"));
        assert!(normalize("message abc123def456").contains("ID"));
    }

    #[test]
    fn word_overlap_matches_expected_bounds() {
        assert_eq!(word_overlap("hello world", "hello world"), 1.0);
        let partial = word_overlap("hello world foo", "hello world bar");
        assert!(partial > 0.3 && partial < 0.8);
        assert_eq!(word_overlap("aaa", "bbb"), 0.0);
        assert_eq!(word_overlap("", "hello"), 0.0);
    }

    #[test]
    fn classify_routing_beats_communication_for_archive_email() {
        assert_eq!(classify_action("archive_email", &serde_json::Value::Null), "email_routing");
        assert_eq!(classify_action("send_email", &serde_json::Value::Null), "communication_pattern");
        assert_eq!(classify_action("create_meeting", &serde_json::Value::Null), "calendar_habit");
        assert_eq!(classify_action("search_docs", &serde_json::Value::Null), "recurring_search");
    }

    #[test]
    fn classify_falls_back_to_context() {
        let time_ctx = serde_json::json!({"time_of_day": "09:00"});
        assert_eq!(classify_action("do_stuff", &time_ctx), "time_pattern");
        let seq_ctx = serde_json::json!({"after_action": "meeting"});
        assert_eq!(classify_action("do_stuff", &seq_ctx), "action_sequence");
    }

    #[test]
    fn detect_requires_min_occurrences_and_confidence() {
        let d = detector();
        d.observe("time_pattern", "Check email morning", 0.8, None).unwrap();
        d.observe("time_pattern", "Check email morning", 0.9, None).unwrap();
        assert!(d.detect_defaults().unwrap().is_empty());

        for _ in 0..3 {
            d.observe("time_pattern", "Morning email check", 0.8, None).unwrap();
        }
        let patterns = d.detect_defaults().unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].occurrences, 3);
    }

    #[test]
    fn detect_filters_low_confidence_clusters() {
        let d = detector();
        for _ in 0..3 {
            d.observe("time_pattern", "Random check", 0.2, None).unwrap();
        }
        assert!(d.detect_defaults().unwrap().is_empty());
    }

    #[test]
    fn detect_separates_distinct_clusters_and_types() {
        let d = detector();
        for _ in 0..4 {
            d.observe("time_pattern", "Morning email check", 0.8, None).unwrap();
        }
        for _ in 0..3 {
            d.observe("time_pattern", "Evening report writing", 0.7, None).unwrap();
        }
        for _ in 0..3 {
            d.observe("email_routing", "Archive newsletters", 0.9, None).unwrap();
        }
        let patterns = d.detect_defaults().unwrap();
        assert_eq!(patterns.len(), 3);
        let types: std::collections::HashSet<_> = patterns.iter().map(|p| p.pattern_type.clone()).collect();
        assert!(types.contains("time_pattern"));
        assert!(types.contains("email_routing"));
    }

    #[test]
    fn propose_automations_maps_pattern_type_to_action() {
        let d = detector();
        for _ in 0..5 {
            d.observe("email_routing", "Archive newsletters from TechDigest", 0.9, None).unwrap();
        }
        d.detect_defaults().unwrap();
        let proposals = d.propose_automations();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].action_type, "auto_route_email");
    }

    #[test]
    fn weak_patterns_get_no_proposal() {
        let d = detector();
        for _ in 0..3 {
            d.observe("time_pattern", "Weak pattern", 0.55, None).unwrap();
        }
        d.detect_defaults().unwrap();
        assert!(d.propose_automations().is_empty());
    }

    #[test]
    fn promote_pattern_marks_observations() {
        let d = detector();
        for _ in 0..3 {
            d.observe("email_routing", "Archive newsletters", 0.9, None).unwrap();
        }
        let patterns = d.detect_defaults().unwrap();
        d.promote_pattern(&patterns[0]).unwrap();
        let obs = d.store.list_observations(Some("email_routing"), 0.0, 30).unwrap();
        assert!(obs.iter().all(|o| o.promoted_to_automation));
    }

    #[test]
    fn cluster_observations_groups_identical_descriptions() {
        let obs = vec![
            ObsRef { id: 1, description: "reads email morning".into() },
            ObsRef { id: 2, description: "reads email morning".into() },
            ObsRef { id: 3, description: "reads email morning".into() },
            ObsRef { id: 4, description: "writes report evening".into() },
        ];
        let clusters = cluster_observations(&obs, 0.6);
        assert_eq!(clusters.len(), 2);
        let mut sizes: Vec<usize> = clusters.iter().map(|c| c.len()).collect();
        sizes.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(sizes[0], 3);
    }

    #[test]
    fn cluster_observations_empty_input() {
        assert!(cluster_observations(&[], 0.6).is_empty());
    }
}
