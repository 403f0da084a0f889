//! Briefing data sections — spec.md §2 BriefingGenerator row, resolved
//! from `original_source/src/omnibrain/briefing.py`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BriefingKind {
    Morning,
    Evening,
    Weekly,
}

impl BriefingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BriefingKind::Morning => "morning",
            BriefingKind::Evening => "evening",
            BriefingKind::Weekly => "weekly",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSection {
    pub total: i64,
    pub unread: i64,
    pub urgent: i64,
    pub needs_response: i64,
    pub drafts_ready: i64,
    pub top_senders: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarEventItem {
    pub title: String,
    pub time: String,
    pub attendees: i64,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalendarSection {
    pub total_events: i64,
    pub total_hours: f64,
    pub next_meeting: String,
    pub next_meeting_time: String,
    pub events: Vec<CalendarEventItem>,
    pub conflicts: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighPriorityProposal {
    pub proposal_type: String,
    pub title: String,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalSection {
    pub total_pending: i64,
    pub by_type: std::collections::BTreeMap<String, i64>,
    pub high_priority: Vec<HighPriorityProposal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityItem {
    pub rank: usize,
    pub title: String,
    pub reason: String,
    pub source: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BriefingData {
    pub date: chrono::NaiveDate,
    pub briefing_type: String,
    pub emails: EmailSection,
    pub calendar: CalendarSection,
    pub proposals: ProposalSection,
    pub priorities: Vec<PriorityItem>,
    pub observations: Vec<String>,
    pub memory_highlights: Vec<String>,
}

impl BriefingData {
    pub fn events_processed(&self) -> i64 {
        self.emails.total + self.calendar.total_events
    }

    pub fn actions_proposed(&self) -> i64 {
        self.proposals.total_pending
    }

    pub fn has_meaningful_data(&self) -> bool {
        self.emails.total > 0
            || self.calendar.total_events > 0
            || self.proposals.total_pending > 0
            || !self.priorities.is_empty()
            || !self.observations.is_empty()
            || !self.memory_highlights.is_empty()
    }
}
