//! Priority scoring and notification-level selection — spec.md §4.3.
//!
//! Pure functions: no I/O, no shared state beyond the rate-limit window
//! `NotificationLevelSelector` carries across calls. Generalizes the
//! weighted-sum-then-threshold shape of a single core-eligibility gate
//! into a continuous score plus a four-level notification ladder.

use std::collections::VecDeque;

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Critical,
    Important,
    Fyi,
    Silent,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Critical => "critical",
            NotificationLevel::Important => "important",
            NotificationLevel::Fyi => "fyi",
            NotificationLevel::Silent => "silent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Client,
    Investor,
    Family,
    Colleague,
    Friend,
    Vendor,
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct ScoringSignals<'a> {
    pub urgency_label: Option<&'a str>,
    /// Fallback priority enum value when `urgency_label` is absent:
    /// `critical/high/medium/low/unset`.
    pub priority_value: Option<&'a str>,
    pub deadline: Option<DateTime<Utc>>,
    pub reference_time: Option<DateTime<Utc>>,
    pub is_vip: bool,
    pub relationship: Option<Relationship>,
    pub interaction_count: i64,
    pub item_type: Option<&'a str>,
    pub pattern_strength: f32,
    pub pattern_occurrences: u32,
    pub force_critical: bool,
    pub force_silent: bool,
}

impl Default for Relationship {
    fn default() -> Self {
        Relationship::Unknown
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub urgency: f32,
    pub deadline: f32,
    pub contact: f32,
    pub item_type: f32,
    pub pattern: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityScore {
    pub score: f32,
    pub notification_level: NotificationLevel,
    pub breakdown: SignalBreakdown,
    pub reason: String,
}

/// Default per-signal weights; sum to 1.0. Custom weights are renormalized
/// by [`PriorityScorer::with_weights`].
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub urgency: f32,
    pub deadline: f32,
    pub contact: f32,
    pub item_type: f32,
    pub pattern: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            urgency: 0.30,
            deadline: 0.25,
            contact: 0.20,
            item_type: 0.15,
            pattern: 0.10,
        }
    }
}

impl Weights {
    fn renormalized(self) -> Self {
        let total = self.urgency + self.deadline + self.contact + self.item_type + self.pattern;
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            urgency: self.urgency / total,
            deadline: self.deadline / total,
            contact: self.contact / total,
            item_type: self.item_type / total,
            pattern: self.pattern / total,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityScorer {
    weights: WeightsOrDefault,
}

#[derive(Debug, Clone, Copy)]
enum WeightsOrDefault {
    Default,
    Custom(Weights),
}

impl Default for WeightsOrDefault {
    fn default() -> Self {
        WeightsOrDefault::Default
    }
}

impl PriorityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: Weights) -> Self {
        Self {
            weights: WeightsOrDefault::Custom(weights.renormalized()),
        }
    }

    fn weights(&self) -> Weights {
        match self.weights {
            WeightsOrDefault::Default => Weights::default(),
            WeightsOrDefault::Custom(w) => w,
        }
    }

    fn urgency_signal(signals: &ScoringSignals) -> f32 {
        if let Some(label) = signals.urgency_label {
            return match label {
                "critical" => 1.0,
                "high" => 0.8,
                "medium" => 0.5,
                "low" => 0.2,
                _ => 0.3,
            };
        }
        match signals.priority_value {
            Some("critical") => 1.0,
            Some("high") => 0.8,
            Some("medium") => 0.5,
            Some("low") => 0.2,
            Some("unset") | None => 0.3,
            Some(_) => 0.3,
        }
    }

    fn deadline_signal(signals: &ScoringSignals) -> f32 {
        let Some(deadline) = signals.deadline else {
            return 0.0;
        };
        let reference = signals.reference_time.unwrap_or_else(Utc::now);
        let delta = deadline - reference;
        if delta <= chrono::Duration::zero() {
            return 1.0;
        }
        let minutes = delta.num_minutes();
        if minutes <= 30 {
            1.0
        } else if minutes <= 120 {
            0.8
        } else if minutes <= 8 * 60 {
            0.6
        } else if minutes <= 24 * 60 {
            0.4
        } else if minutes <= 72 * 60 {
            0.2
        } else {
            0.1
        }
    }

    fn contact_signal(signals: &ScoringSignals) -> f32 {
        let base = match signals.relationship {
            Some(Relationship::Client) | Some(Relationship::Investor) => 0.9,
            Some(Relationship::Family) => 0.8,
            Some(Relationship::Colleague) => 0.6,
            Some(Relationship::Friend) => 0.5,
            Some(Relationship::Vendor) => 0.4,
            Some(Relationship::Unknown) | None => 0.2,
        };
        let base = if signals.is_vip { base.max(0.8) } else { base };
        let bonus = (signals.interaction_count as f32 / 50.0).min(0.2);
        (base + bonus).min(1.0)
    }

    fn item_type_signal(signals: &ScoringSignals) -> f32 {
        match signals.item_type {
            Some("action_required") | Some("urgent_email") => 0.9,
            Some("meeting_prep") => 0.8,
            Some("email_draft") | Some("proposal") => 0.7,
            Some("personal") => 0.5,
            Some("fyi") => 0.3,
            Some("newsletter") => 0.2,
            Some("spam") => 0.0,
            _ => 0.3,
        }
    }

    fn pattern_signal(signals: &ScoringSignals) -> f32 {
        if signals.pattern_strength == 0.0 && signals.pattern_occurrences == 0 {
            return 0.0;
        }
        (signals.pattern_strength + (signals.pattern_occurrences as f32 / 50.0).min(0.3)).min(1.0)
    }

    pub fn score(&self, signals: &ScoringSignals) -> PriorityScore {
        if signals.force_critical {
            return PriorityScore {
                score: 1.0,
                notification_level: NotificationLevel::Critical,
                breakdown: SignalBreakdown {
                    urgency: 0.0,
                    deadline: 0.0,
                    contact: 0.0,
                    item_type: 0.0,
                    pattern: 0.0,
                },
                reason: "Force-critical override".to_string(),
            };
        }
        if signals.force_silent {
            return PriorityScore {
                score: 0.0,
                notification_level: NotificationLevel::Silent,
                breakdown: SignalBreakdown {
                    urgency: 0.0,
                    deadline: 0.0,
                    contact: 0.0,
                    item_type: 0.0,
                    pattern: 0.0,
                },
                reason: "Force-silent override".to_string(),
            };
        }

        let weights = self.weights();
        let urgency = Self::urgency_signal(signals);
        let deadline = Self::deadline_signal(signals);
        let contact = Self::contact_signal(signals);
        let item_type = Self::item_type_signal(signals);
        let pattern = Self::pattern_signal(signals);

        let weighted = [
            ("urgency", urgency * weights.urgency),
            ("deadline", deadline * weights.deadline),
            ("contact", contact * weights.contact),
            ("item type", item_type * weights.item_type),
            ("pattern", pattern * weights.pattern),
        ];

        let total: f32 = weighted.iter().map(|(_, v)| v).sum();
        let score = total.min(1.0);
        let level = Self::level_for_score(score);
        let reason = Self::build_reason(&weighted);

        PriorityScore {
            score,
            notification_level: level,
            breakdown: SignalBreakdown {
                urgency,
                deadline,
                contact,
                item_type,
                pattern,
            },
            reason,
        }
    }

    fn level_for_score(score: f32) -> NotificationLevel {
        if score >= 0.85 {
            NotificationLevel::Critical
        } else if score >= 0.55 {
            NotificationLevel::Important
        } else if score >= 0.25 {
            NotificationLevel::Fyi
        } else {
            NotificationLevel::Silent
        }
    }

    /// Names the top-weighted signal plus any others contributing >= 0.1.
    fn build_reason(weighted: &[(&str, f32); 5]) -> String {
        let mut sorted: Vec<_> = weighted.to_vec();
        sorted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let mut names: Vec<&str> = sorted
            .iter()
            .filter(|(_, v)| *v >= 0.1)
            .map(|(name, _)| *name)
            .collect();
        if names.is_empty() {
            if let Some((name, _)) = sorted.first() {
                names.push(name);
            }
        }
        names.join(", ")
    }

    // ── convenience constructors ────────────────────────────────────────

    pub fn for_email(&self, urgency: &str, is_vip: bool, relationship: Relationship, category: &str) -> PriorityScore {
        self.score(&ScoringSignals {
            urgency_label: Some(urgency),
            is_vip,
            relationship: Some(relationship),
            item_type: Some(category),
            ..Default::default()
        })
    }

    pub fn for_event(&self, minutes_until: i64, attendees: i64, has_vip: bool, priority: &str) -> PriorityScore {
        let deadline = Utc::now() + chrono::Duration::minutes(minutes_until);
        self.score(&ScoringSignals {
            priority_value: Some(priority),
            deadline: Some(deadline),
            reference_time: Some(Utc::now()),
            is_vip: has_vip,
            interaction_count: attendees,
            item_type: Some("meeting_prep"),
            ..Default::default()
        })
    }

    pub fn for_proposal(&self, priority: &str, proposal_type: &str) -> PriorityScore {
        self.score(&ScoringSignals {
            priority_value: Some(priority),
            item_type: Some(proposal_type),
            ..Default::default()
        })
    }

    pub fn for_pattern(&self, strength: f32, occurrences: u32) -> PriorityScore {
        self.score(&ScoringSignals {
            pattern_strength: strength,
            pattern_occurrences: occurrences,
            ..Default::default()
        })
    }

    pub fn for_score(&self, s: f32) -> NotificationLevel {
        Self::level_for_score(s)
    }
}

/// Wraps a [`PriorityScorer`] with quiet-hours and rate-limit modifiers.
pub struct NotificationLevelSelector {
    scorer: PriorityScorer,
    quiet_hours: Option<(u8, u8)>,
    max_critical_per_hour: usize,
    critical_history: VecDeque<DateTime<Utc>>,
}

impl NotificationLevelSelector {
    pub fn new(scorer: PriorityScorer, quiet_hours: Option<(u8, u8)>, max_critical_per_hour: usize) -> Self {
        Self {
            scorer,
            quiet_hours,
            max_critical_per_hour,
            critical_history: VecDeque::new(),
        }
    }

    /// Handles overnight windows where `start > end` (e.g. `(22, 7)`).
    fn in_quiet_hours(&self, now: DateTime<Utc>) -> bool {
        let Some((start, end)) = self.quiet_hours else {
            return false;
        };
        let hour = now.hour() as u8;
        if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    fn prune_history(&mut self, now: DateTime<Utc>) {
        let window_start = now - chrono::Duration::hours(1);
        self.critical_history
            .retain(|&ts| ts > window_start && ts <= now);
    }

    pub fn select(&mut self, signals: &ScoringSignals, now: DateTime<Utc>) -> PriorityScore {
        let mut result = self.scorer.score(signals);

        if self.in_quiet_hours(now) {
            result.notification_level = match result.notification_level {
                NotificationLevel::Critical => NotificationLevel::Important,
                NotificationLevel::Important => NotificationLevel::Fyi,
                NotificationLevel::Fyi => NotificationLevel::Fyi,
                NotificationLevel::Silent => NotificationLevel::Silent,
            };
        }

        self.prune_history(now);
        if result.notification_level == NotificationLevel::Critical {
            if self.critical_history.len() >= self.max_critical_per_hour {
                result.notification_level = NotificationLevel::Important;
            } else {
                self.critical_history.push_back(now);
            }
        }

        result
    }
}

/// `(start,end)` window contains `hour` — handles overnight wraps.
pub fn is_in_quiet_window(hour: u8, start: u8, end: u8) -> bool {
    if start <= end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_bounded_and_monotonic_in_urgency() {
        let scorer = PriorityScorer::new();
        let low = scorer.score(&ScoringSignals {
            urgency_label: Some("low"),
            ..Default::default()
        });
        let high = scorer.score(&ScoringSignals {
            urgency_label: Some("critical"),
            ..Default::default()
        });
        assert!((0.0..=1.0).contains(&low.score));
        assert!((0.0..=1.0).contains(&high.score));
        assert!(high.score > low.score);
    }

    #[test]
    fn all_zero_signals_is_silent() {
        let scorer = PriorityScorer::new();
        let result = scorer.score(&ScoringSignals::default());
        assert_eq!(result.notification_level, NotificationLevel::Silent);
    }

    #[test]
    fn force_overrides_short_circuit() {
        let scorer = PriorityScorer::new();
        let critical = scorer.score(&ScoringSignals {
            force_critical: true,
            ..Default::default()
        });
        assert_eq!(critical.score, 1.0);
        assert_eq!(critical.notification_level, NotificationLevel::Critical);

        let silent = scorer.score(&ScoringSignals {
            force_silent: true,
            urgency_label: Some("critical"),
            ..Default::default()
        });
        assert_eq!(silent.score, 0.0);
        assert_eq!(silent.notification_level, NotificationLevel::Silent);
    }

    #[test]
    fn quiet_hours_window_wraps_overnight() {
        assert!(is_in_quiet_window(23, 22, 7));
        assert!(is_in_quiet_window(3, 22, 7));
        assert!(!is_in_quiet_window(14, 22, 7));
    }

    #[test]
    fn deadline_exactly_now_is_past_due() {
        let scorer = PriorityScorer::new();
        let now = Utc::now();
        let result = scorer.score(&ScoringSignals {
            deadline: Some(now),
            reference_time: Some(now),
            ..Default::default()
        });
        assert_eq!(result.breakdown.deadline, 1.0);
    }

    #[test]
    fn quiet_hours_window_downgrades_critical_to_important() {
        let mut selector = NotificationLevelSelector::new(PriorityScorer::new(), Some((0, 23)), 10);
        for hour in 0..23u32 {
            let now = Utc::now().with_hour(hour).unwrap();
            let result = selector.select(
                &ScoringSignals {
                    urgency_label: Some("critical"),
                    is_vip: true,
                    relationship: Some(Relationship::Client),
                    item_type: Some("action_required"),
                    ..Default::default()
                },
                now,
            );
            assert_ne!(result.notification_level, NotificationLevel::Critical);
        }
    }

    #[test]
    fn rate_limit_caps_criticals_per_hour() {
        let mut selector = NotificationLevelSelector::new(PriorityScorer::new(), None, 2);
        let now = Utc::now();
        let signals = ScoringSignals {
            urgency_label: Some("critical"),
            is_vip: true,
            relationship: Some(Relationship::Client),
            item_type: Some("action_required"),
            ..Default::default()
        };
        let first = selector.select(&signals, now);
        let second = selector.select(&signals, now);
        let third = selector.select(&signals, now);
        assert_eq!(first.notification_level, NotificationLevel::Critical);
        assert_eq!(second.notification_level, NotificationLevel::Critical);
        assert_eq!(third.notification_level, NotificationLevel::Important);
    }
}
