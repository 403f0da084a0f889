//! `ReviewEngine` — spec.md §2 table row, resolved from
//! `original_source/src/omnibrain/review_engine.py`.
//!
//! The original tracks day/week stats from a synthetic event log
//! (`proposal_created`/`proposal_executed`/`proposal_rejected` rows).
//! This port has no such log — `omnibrain_store::Proposal` tracks status
//! transitions directly — so day/week proposal counters are derived from
//! `Proposal::created_at` plus current `status` via
//! [`Store::list_proposals_since`] instead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use omnibrain_memory::{Memory, SourceFilter};
use omnibrain_store::schema::ProposalStatus;
use omnibrain_store::Store;

const MINUTES_PER_DRAFT: i64 = 8;
const MINUTES_PER_CLASSIFICATION: i64 = 1;
const MINUTES_PER_PROPOSAL: i64 = 3;

#[derive(Debug, Clone, Default)]
pub struct DayStats {
    pub date: NaiveDate,
    pub emails_received: i64,
    pub emails_classified: i64,
    pub drafts_generated: i64,
    pub calendar_events: i64,
    pub proposals_created: i64,
    pub proposals_executed: i64,
    pub proposals_rejected: i64,
    pub observations_detected: i64,
    pub memory_entries_stored: i64,
}

impl DayStats {
    pub fn actions_taken(&self) -> i64 {
        self.proposals_executed + self.drafts_generated
    }

    pub fn total_events_processed(&self) -> i64 {
        self.emails_received + self.calendar_events
    }
}

#[derive(Debug, Clone, Default)]
pub struct EveningSummary {
    pub date: NaiveDate,
    pub stats: DayStats,
    pub top_contacts: Vec<String>,
    pub key_decisions: Vec<String>,
    pub patterns_detected: Vec<String>,
    pub tomorrow_events: Vec<String>,
    pub tomorrow_preview: String,
    pub time_saved_minutes: i64,
}

impl EveningSummary {
    pub fn format_text(&self) -> String {
        let mut lines = vec![format!("**\u{1F319} Evening Summary — {}**\n", self.date)];

        lines.push("**\u{1F4CA} Today in Numbers**".to_string());
        lines.push(format!("• {} emails processed, {} classified", self.stats.emails_received, self.stats.emails_classified));
        lines.push(format!("• {} calendar events", self.stats.calendar_events));
        lines.push(format!("• {} actions taken ({} drafts, {} proposals executed)", self.stats.actions_taken(), self.stats.drafts_generated, self.stats.proposals_executed));
        if self.time_saved_minutes > 0 {
            lines.push(format!("• \u{23F1}\u{FE0F} ~{} minutes saved", self.time_saved_minutes));
        }
        lines.push(String::new());

        if !self.top_contacts.is_empty() {
            lines.push("**\u{1F465} Most Active Contacts**".to_string());
            for contact in self.top_contacts.iter().take(5) {
                lines.push(format!("• {contact}"));
            }
            lines.push(String::new());
        }

        if !self.key_decisions.is_empty() {
            lines.push("**\u{2705} Key Decisions**".to_string());
            for decision in self.key_decisions.iter().take(5) {
                lines.push(format!("• {decision}"));
            }
            lines.push(String::new());
        }

        if !self.patterns_detected.is_empty() {
            lines.push("**\u{1F4A1} Patterns Detected**".to_string());
            for pattern in self.patterns_detected.iter().take(3) {
                lines.push(format!("• {pattern}"));
            }
            lines.push(String::new());
        }

        lines.push("**\u{1F4C5} Tomorrow Preview**".to_string());
        for event in self.tomorrow_events.iter().take(5) {
            lines.push(format!("• {event}"));
        }
        lines.push(self.tomorrow_preview.clone());

        lines.join("\n").trim().to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeekStats {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub daily_stats: Vec<DayStats>,
}

impl WeekStats {
    pub fn total_emails(&self) -> i64 {
        self.daily_stats.iter().map(|d| d.emails_received).sum()
    }
    pub fn total_meetings(&self) -> i64 {
        self.daily_stats.iter().map(|d| d.calendar_events).sum()
    }
    pub fn total_actions(&self) -> i64 {
        self.daily_stats.iter().map(|d| d.actions_taken()).sum()
    }
    pub fn total_observations(&self) -> i64 {
        self.daily_stats.iter().map(|d| d.observations_detected).sum()
    }
    pub fn busiest_day(&self) -> Option<&DayStats> {
        self.daily_stats.iter().max_by_key(|d| d.total_events_processed())
    }
    pub fn quietest_day(&self) -> Option<&DayStats> {
        self.daily_stats.iter().min_by_key(|d| d.total_events_processed())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeeklyReview {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub stats: WeekStats,
    pub top_contacts: Vec<String>,
    pub trends: Vec<String>,
    pub observations_summary: Vec<String>,
    pub projects_active: Vec<String>,
    pub total_time_saved_minutes: i64,
}

impl WeeklyReview {
    pub fn format_text(&self) -> String {
        let mut lines = vec![format!("**\u{1F4CA} Weekly Review — {} to {}**\n", self.week_start, self.week_end)];

        lines.push("**\u{1F522} Week in Numbers**".to_string());
        lines.push(format!("• {} emails, {} meetings, {} actions taken", self.stats.total_emails(), self.stats.total_meetings(), self.stats.total_actions()));
        if self.total_time_saved_minutes > 0 {
            lines.push(format!("• \u{23F1}\u{FE0F} ~{} minutes saved this week", self.total_time_saved_minutes));
        }
        lines.push(String::new());

        lines.push("**\u{1F4C8} Daily Distribution**".to_string());
        let max_count = self.stats.daily_stats.iter().map(|d| d.total_events_processed()).max().unwrap_or(0).max(1);
        for day in &self.stats.daily_stats {
            let bar_len = ((day.total_events_processed() as f64 / max_count as f64) * 20.0).round() as usize;
            let bar: String = "\u{2588}".repeat(bar_len.min(20));
            lines.push(format!("  {} {} ({})", day.date, bar, day.total_events_processed()));
        }
        if let Some(busiest) = self.stats.busiest_day() {
            lines.push(format!("• Busiest day: {}", busiest.date));
        }
        if let Some(quietest) = self.stats.quietest_day() {
            lines.push(format!("• Quietest day: {}", quietest.date));
        }
        lines.push(String::new());

        if !self.trends.is_empty() {
            lines.push("**\u{1F4C9} Trends**".to_string());
            for trend in self.trends.iter().take(5) {
                lines.push(format!("• {trend}"));
            }
            lines.push(String::new());
        }

        if !self.top_contacts.is_empty() {
            lines.push("**\u{1F465} Top Contacts This Week**".to_string());
            for contact in self.top_contacts.iter().take(5) {
                lines.push(format!("• {contact}"));
            }
            lines.push(String::new());
        }

        if !self.observations_summary.is_empty() {
            lines.push("**\u{1F4A1} Patterns & Observations**".to_string());
            for obs in self.observations_summary.iter().take(5) {
                lines.push(format!("• {obs}"));
            }
            lines.push(String::new());
        }

        if !self.projects_active.is_empty() {
            lines.push("**\u{1F5C2}\u{FE0F} Active Projects**".to_string());
            for project in self.projects_active.iter().take(5) {
                lines.push(format!("• {project}"));
            }
        }

        lines.join("\n").trim().to_string()
    }
}

pub struct ReviewEngine {
    store: Arc<Store>,
    memory: Option<Arc<Memory>>,
}

impl ReviewEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, memory: None }
    }

    pub fn with_memory(mut self, memory: Arc<Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn generate_evening(&self, date: Option<NaiveDate>) -> EveningSummary {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let stats = self.compute_day_stats(date);
        let tomorrow = date.succ_opt().unwrap_or(date);
        let tomorrow_events = self.get_events_for_day(tomorrow);

        EveningSummary {
            date,
            top_contacts: self.get_top_contacts_for_day(date),
            key_decisions: self.get_key_decisions(date),
            patterns_detected: self.get_patterns_for_day(date),
            tomorrow_preview: build_tomorrow_preview(&tomorrow_events),
            tomorrow_events,
            time_saved_minutes: estimate_time_saved(&stats),
            stats,
        }
    }

    pub fn generate_weekly(&self, end_date: Option<NaiveDate>, days: i64) -> WeeklyReview {
        let end_date = end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start_date = end_date - chrono::Duration::days(days - 1);

        let mut daily_stats = Vec::new();
        let mut cursor = start_date;
        while cursor <= end_date {
            daily_stats.push(self.compute_day_stats(cursor));
            cursor = cursor.succ_opt().unwrap_or(cursor + chrono::Duration::days(1));
        }

        let total_time_saved_minutes = daily_stats.iter().map(estimate_time_saved).sum();
        let stats = WeekStats { start_date, end_date, daily_stats };

        WeeklyReview {
            week_start: start_date,
            week_end: end_date,
            top_contacts: self.get_top_contacts_for_period(start_date, end_date),
            trends: detect_trends(&stats.daily_stats),
            observations_summary: self.get_observations_summary(days),
            projects_active: self.get_active_projects(days),
            total_time_saved_minutes,
            stats,
        }
    }

    fn day_bounds(date: NaiveDate) -> (chrono::DateTime<Utc>, chrono::DateTime<Utc>) {
        let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()));
        (start, end)
    }

    fn compute_day_stats(&self, date: NaiveDate) -> DayStats {
        let (start, end) = Self::day_bounds(date);
        let mut stats = DayStats { date, ..Default::default() };

        if let Ok(events) = self.store.query_events(None, None, Some(start), Some(end), 500, false) {
            for event in &events {
                match event.event_type.as_str() {
                    "email" | "email_received" => stats.emails_received += 1,
                    "calendar_event" => stats.calendar_events += 1,
                    "email_classified" => stats.emails_classified += 1,
                    "email_draft_generated" => stats.drafts_generated += 1,
                    _ => {}
                }
            }
        }

        if let Ok(proposals) = self.store.list_proposals_since(start) {
            for proposal in &proposals {
                if proposal.created_at < start || proposal.created_at > end {
                    continue;
                }
                stats.proposals_created += 1;
                match proposal.status {
                    ProposalStatus::Executed => stats.proposals_executed += 1,
                    ProposalStatus::Rejected => stats.proposals_rejected += 1,
                    _ => {}
                }
            }
        }

        if let Ok(observations) = self.store.list_observations(None, 0.0, 1) {
            stats.observations_detected = observations.iter().filter(|o| o.ts >= start && o.ts <= end).count() as i64;
        }

        if let Some(memory) = &self.memory {
            if let Ok(docs) = memory.get_recent(200, &SourceFilter::All, None) {
                stats.memory_entries_stored = docs.iter().filter(|d| d.ts >= start && d.ts <= end).count() as i64;
            }
        }

        stats
    }

    fn get_top_contacts_for_day(&self, date: NaiveDate) -> Vec<String> {
        let (start, end) = Self::day_bounds(date);
        self.top_contacts_in_range(start, end)
    }

    fn get_top_contacts_for_period(&self, start_date: NaiveDate, end_date: NaiveDate) -> Vec<String> {
        let start = Utc.from_utc_datetime(&start_date.and_time(NaiveTime::MIN));
        let end = Utc.from_utc_datetime(&end_date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()));
        self.top_contacts_in_range(start, end)
    }

    fn top_contacts_in_range(&self, start: chrono::DateTime<Utc>, end: chrono::DateTime<Utc>) -> Vec<String> {
        let Ok(events) = self.store.query_events(None, None, Some(start), Some(end), 500, false) else {
            return Vec::new();
        };

        let mut counts: HashMap<String, i64> = HashMap::new();
        for event in &events {
            if let Some(sender) = event.sender_email() {
                *counts.entry(sender.to_string()).or_insert(0) += 1;
            }
            for attendee in event.attendees() {
                *counts.entry(attendee).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<_> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().take(5).map(|(email, count)| format!("{email} ({count})")).collect()
    }

    fn get_key_decisions(&self, date: NaiveDate) -> Vec<String> {
        let (start, end) = Self::day_bounds(date);
        self.store
            .list_proposals_since(start)
            .map(|proposals| {
                proposals
                    .into_iter()
                    .filter(|p| p.status == ProposalStatus::Executed && p.created_at >= start && p.created_at <= end)
                    .map(|p| p.title)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_patterns_for_day(&self, date: NaiveDate) -> Vec<String> {
        let (start, end) = Self::day_bounds(date);
        self.store
            .list_observations(None, 0.0, 1)
            .map(|observations| {
                observations
                    .into_iter()
                    .filter(|o| o.ts >= start && o.ts <= end)
                    .map(|o| format!("{}: {}", o.pattern_type, o.description))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_events_for_day(&self, date: NaiveDate) -> Vec<String> {
        let (start, end) = Self::day_bounds(date);
        self.store
            .query_events(Some("calendar"), None, Some(start), Some(end), 30, false)
            .map(|events| {
                events
                    .into_iter()
                    .map(|e| {
                        let time = e.start_time().and_then(|s| s.parse::<chrono::DateTime<Utc>>().ok()).map(|t| t.format("%H:%M").to_string()).unwrap_or_default();
                        format!("{time} {}", e.title)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_observations_summary(&self, days: i64) -> Vec<String> {
        self.store
            .list_observations(None, 0.0, days)
            .map(|observations| {
                observations
                    .into_iter()
                    .map(|o| format!("[{}] {} (confidence: {:.0}%)", o.pattern_type, o.description, o.confidence * 100.0))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn get_active_projects(&self, days: i64) -> Vec<String> {
        let since = Utc::now() - chrono::Duration::days(days);
        let Ok(events) = self.store.query_events(None, Some("project_activity"), Some(since), None, 500, false) else {
            return Vec::new();
        };
        let mut projects: HashSet<String> = HashSet::new();
        for event in &events {
            if let Some(name) = event.source.strip_prefix("project:") {
                projects.insert(name.to_string());
            }
        }
        let mut sorted: Vec<_> = projects.into_iter().collect();
        sorted.sort();
        sorted
    }
}

fn build_tomorrow_preview(events: &[String]) -> String {
    match events.len() {
        0 => "No meetings scheduled — deep work day!".to_string(),
        1 => format!("1 meeting: {}", events[0]),
        n => format!("{n} meetings, starting with: {}", events[0]),
    }
}

fn estimate_time_saved(stats: &DayStats) -> i64 {
    stats.drafts_generated * MINUTES_PER_DRAFT
        + stats.emails_classified * MINUTES_PER_CLASSIFICATION
        + stats.proposals_executed * MINUTES_PER_PROPOSAL
}

fn detect_trends(daily_stats: &[DayStats]) -> Vec<String> {
    let mut trends = Vec::new();
    if daily_stats.len() < 2 {
        return trends;
    }

    let mid = daily_stats.len() / 2;
    let first_half_avg = daily_stats[..mid].iter().map(|d| d.emails_received).sum::<i64>() as f64 / mid as f64;
    let second_half = &daily_stats[mid..];
    let second_half_avg = second_half.iter().map(|d| d.emails_received).sum::<i64>() as f64 / second_half.len() as f64;

    if first_half_avg > 0.0 {
        let ratio = second_half_avg / first_half_avg;
        if ratio > 1.3 {
            trends.push("Email volume is increasing".to_string());
        } else if ratio < 0.7 {
            trends.push("Email volume is decreasing".to_string());
        } else {
            trends.push("Email volume is stable".to_string());
        }
    } else if second_half_avg > 0.0 {
        trends.push("Email volume is increasing".to_string());
    }

    let meeting_heavy_days = daily_stats.iter().filter(|d| d.calendar_events >= 3).count();
    if meeting_heavy_days >= 3 {
        trends.push("Meeting-heavy week".to_string());
    }

    let total_created: i64 = daily_stats.iter().map(|d| d.proposals_created).sum();
    let total_executed: i64 = daily_stats.iter().map(|d| d.proposals_executed).sum();
    if total_created > 0 {
        let rate = (total_executed as f64 / total_created as f64) * 100.0;
        trends.push(format!("Proposal acceptance rate: {rate:.0}%"));
    }

    trends
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str, emails: i64, events: i64) -> DayStats {
        DayStats {
            date: date.parse().unwrap(),
            emails_received: emails,
            calendar_events: events,
            ..Default::default()
        }
    }

    #[test]
    fn estimate_time_saved_sums_each_category() {
        let stats = DayStats { drafts_generated: 2, emails_classified: 10, proposals_executed: 3, ..Default::default() };
        assert_eq!(estimate_time_saved(&stats), 2 * 8 + 10 * 1 + 3 * 3);
    }

    #[test]
    fn tomorrow_preview_handles_zero_one_many() {
        assert!(build_tomorrow_preview(&[]).contains("deep work"));
        assert_eq!(build_tomorrow_preview(&["09:00 Standup".to_string()]), "1 meeting: 09:00 Standup");
        let preview = build_tomorrow_preview(&["09:00 A".to_string(), "10:00 B".to_string()]);
        assert!(preview.starts_with("2 meetings"));
    }

    #[test]
    fn detect_trends_needs_at_least_two_days() {
        assert!(detect_trends(&[day("2026-07-28", 1, 0)]).is_empty());
    }

    #[test]
    fn detect_trends_flags_increasing_email_volume() {
        let days = vec![day("2026-07-26", 1, 0), day("2026-07-27", 1, 0), day("2026-07-28", 5, 0)];
        let trends = detect_trends(&days);
        assert!(trends.iter().any(|t| t.contains("increasing")));
    }

    #[test]
    fn detect_trends_flags_meeting_heavy_week() {
        let days = vec![day("2026-07-24", 0, 3), day("2026-07-25", 0, 4), day("2026-07-26", 0, 3), day("2026-07-27", 0, 0)];
        let trends = detect_trends(&days);
        assert!(trends.iter().any(|t| t.contains("Meeting-heavy")));
    }

    #[test]
    fn week_stats_finds_busiest_and_quietest() {
        let stats = WeekStats {
            start_date: "2026-07-22".parse().unwrap(),
            end_date: "2026-07-28".parse().unwrap(),
            daily_stats: vec![day("2026-07-27", 1, 0), day("2026-07-28", 10, 5)],
        };
        assert_eq!(stats.busiest_day().unwrap().date, "2026-07-28".parse().unwrap());
        assert_eq!(stats.quietest_day().unwrap().date, "2026-07-27".parse().unwrap());
    }

    #[test]
    fn generate_evening_on_empty_store_has_zero_stats() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = ReviewEngine::new(store);
        let summary = engine.generate_evening(Some("2026-07-28".parse().unwrap()));
        assert_eq!(summary.stats.emails_received, 0);
        assert!(summary.tomorrow_preview.contains("deep work"));
    }

    #[test]
    fn generate_weekly_builds_one_day_stats_entry_per_day() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let engine = ReviewEngine::new(store);
        let review = engine.generate_weekly(Some("2026-07-28".parse().unwrap()), 7);
        assert_eq!(review.stats.daily_stats.len(), 7);
        assert_eq!(review.week_start, "2026-07-22".parse().unwrap());
    }
}
