//! `BriefingGenerator` — spec.md §2 table row, resolved from
//! `original_source/src/omnibrain/briefing.py`.

use std::sync::Arc;

use chrono::{NaiveTime, TimeZone, Utc};
use omnibrain_memory::{Memory, SourceFilter};
use omnibrain_store::Store;

use crate::data::{
    BriefingData, CalendarEventItem, CalendarSection, EmailSection, HighPriorityProposal,
    PriorityItem, ProposalSection,
};
use crate::narrative::NarrativeLlm;

const MIN_NARRATIVE_LEN: usize = 50;

pub struct BriefingGenerator {
    store: Arc<Store>,
    memory: Option<Arc<Memory>>,
    llm: Option<Arc<dyn NarrativeLlm>>,
}

impl BriefingGenerator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, memory: None, llm: None }
    }

    pub fn with_memory(mut self, memory: Arc<Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_llm(mut self, llm: Arc<dyn NarrativeLlm>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Heuristic-formatted briefing; use [`Self::generate_narrative`] for
    /// an LLM-authored one.
    pub fn generate(&self, briefing_type: crate::data::BriefingKind) -> (BriefingData, String) {
        let data = self.collect_data(briefing_type);
        let text = Self::format_text(&data);
        (data, text)
    }

    /// Falls back to heuristic formatting when no LLM is configured, the
    /// data is too thin to be worth a call, or the call fails or returns
    /// a suspiciously short response.
    pub async fn generate_narrative(&self, briefing_type: crate::data::BriefingKind) -> (BriefingData, String) {
        let data = self.collect_data(briefing_type);

        if let Some(llm) = &self.llm {
            if data.has_meaningful_data() {
                match self.llm_format(llm.as_ref(), &data).await {
                    Ok(narrative) if narrative.len() > MIN_NARRATIVE_LEN => return (data, narrative),
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "LLM briefing generation failed, falling back"),
                }
            }
        }

        let text = Self::format_text(&data);
        (data, text)
    }

    pub fn generate_and_store(&self, briefing_type: crate::data::BriefingKind) -> anyhow::Result<(BriefingData, String, i64)> {
        let (data, text) = self.generate(briefing_type);
        let id = self.store_briefing(&data, &text)?;
        Ok((data, text, id))
    }

    pub async fn generate_and_store_narrative(
        &self,
        briefing_type: crate::data::BriefingKind,
    ) -> anyhow::Result<(BriefingData, String, i64)> {
        let (data, text) = self.generate_narrative(briefing_type).await;
        let id = self.store_briefing(&data, &text)?;
        Ok((data, text, id))
    }

    fn store_briefing(&self, data: &BriefingData, text: &str) -> anyhow::Result<i64> {
        let id = self.store.insert_briefing(
            &data.briefing_type,
            data.date,
            text,
            data.events_processed(),
            data.actions_proposed(),
        )?;
        tracing::info!(briefing_type = %data.briefing_type, id, "stored briefing");
        Ok(id)
    }

    async fn llm_format(&self, llm: &dyn NarrativeLlm, data: &BriefingData) -> anyhow::Result<String> {
        let user_name = self.store.get_preference("user_name", serde_json::Value::Null).ok().and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();

        let mut sections = Vec::new();
        if data.emails.total > 0 {
            sections.push(format!(
                "EMAILS: {} total, {} unread, {} urgent, {} need response. Top senders: {}.",
                data.emails.total,
                data.emails.unread,
                data.emails.urgent,
                data.emails.needs_response,
                if data.emails.top_senders.is_empty() {
                    "none".to_string()
                } else {
                    data.emails.top_senders.iter().take(3).cloned().collect::<Vec<_>>().join(", ")
                }
            ));
        }
        if data.calendar.total_events > 0 {
            let mut section = format!(
                "CALENDAR: {} events today ({:.1}h).",
                data.calendar.total_events, data.calendar.total_hours
            );
            if !data.calendar.next_meeting.is_empty() {
                section.push_str(&format!(
                    " Next: {} at {}.",
                    data.calendar.next_meeting, data.calendar.next_meeting_time
                ));
            }
            for ev in data.calendar.events.iter().take(5) {
                section.push_str(&format!("\n  - {} {} ({} attendees)", ev.time, ev.title, ev.attendees));
            }
            sections.push(section);
        }
        if data.proposals.total_pending > 0 {
            sections.push(format!("PENDING ACTIONS: {} proposals waiting for approval.", data.proposals.total_pending));
        }
        if !data.priorities.is_empty() {
            let lines: Vec<_> = data.priorities.iter().take(5).map(|p| format!("  {}. {} — {}", p.rank, p.title, p.reason)).collect();
            sections.push(format!("PRIORITIES:\n{}", lines.join("\n")));
        }
        if !data.observations.is_empty() {
            sections.push(format!("PATTERNS: {}", data.observations.iter().take(3).cloned().collect::<Vec<_>>().join("; ")));
        }
        if !data.memory_highlights.is_empty() {
            let lines: Vec<_> = data.memory_highlights.iter().take(5).map(|h| format!("  - {h}")).collect();
            sections.push(format!("WHAT I REMEMBER:\n{}", lines.join("\n")));
        }
        let data_block = if sections.is_empty() { "No data available yet.".to_string() } else { sections.join("\n\n") };

        let system = "You are OmniBrain, a warm personal AI companion. Generate a concise morning briefing from the data below. Be warm but efficient. Use markdown. Include only sections that have data. If there's conversation memory but no email/calendar, focus on what the user shared and what's ahead for them. Keep it under 300 words. Don't invent data.";
        let prompt = format!(
            "Today: {}\nUser: {}\nType: {}\n\nDATA:\n{data_block}\n\nGenerate the briefing.",
            data.date,
            if user_name.is_empty() { "there" } else { &user_name },
            data.briefing_type,
        );

        let response = llm.complete(system, &prompt).await?;
        Ok(response.trim().to_string())
    }

    pub fn collect_data(&self, briefing_type: crate::data::BriefingKind) -> BriefingData {
        let date = Utc::now().date_naive();
        let mut data = BriefingData { date, briefing_type: briefing_type.as_str().to_string(), ..Default::default() };

        data.emails = self.collect_emails();
        data.calendar = self.collect_calendar();
        data.proposals = self.collect_proposals();
        data.observations = self.collect_observations();
        if let Some(memory) = &self.memory {
            data.memory_highlights = collect_memory_highlights(memory.as_ref());
        }
        data.priorities = generate_priorities(&data);

        tracing::info!(
            emails = data.emails.total,
            events = data.calendar.total_events,
            proposals = data.proposals.total_pending,
            priorities = data.priorities.len(),
            "briefing data collected"
        );

        data
    }

    fn collect_emails(&self) -> EmailSection {
        let mut section = EmailSection::default();
        let since = Utc::now() - chrono::Duration::hours(24);
        let events = match self.store.query_events(Some("gmail"), None, Some(since), None, 50, false) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "failed to collect email data");
                return section;
            }
        };

        if !events.is_empty() {
            section.total = events.len() as i64;
            section.unread = events.iter().filter(|e| !e.is_read()).count() as i64;
            section.urgent = events
                .iter()
                .filter(|e| matches!(e.urgency(), Some("critical") | Some("high")))
                .count() as i64;

            let mut senders: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
            for event in &events {
                let sender = event.sender_email().map(str::to_string).unwrap_or_else(|| event.title.clone());
                if !sender.is_empty() {
                    *senders.entry(sender).or_insert(0) += 1;
                }
            }
            let mut ranked: Vec<_> = senders.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1));
            section.top_senders = ranked.into_iter().take(5).map(|(s, _)| s).collect();
        }

        if let Ok(pending) = self.store.list_pending_proposals() {
            section.drafts_ready = pending.iter().filter(|p| p.proposal_type == "email_draft").count() as i64;
        }
        section.needs_response = section.urgent + section.drafts_ready;
        section
    }

    fn collect_calendar(&self) -> CalendarSection {
        let mut section = CalendarSection::default();
        let now = Utc::now();
        let today_start = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN));
        let today_end = Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap()));

        let mut events = match self.store.query_events(Some("calendar"), None, Some(today_start), Some(today_end), 30, false) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(error = %err, "failed to collect calendar data");
                return section;
            }
        };

        if let Ok(chat_events) = self.store.query_events(Some("chat"), None, Some(today_start), Some(today_end), 20, false) {
            let mut existing: std::collections::HashSet<(String, String)> =
                events.iter().map(|e| (e.title.to_lowercase(), e.ts.date_naive().to_string())).collect();
            for chat_event in chat_events {
                let key = (chat_event.title.to_lowercase(), chat_event.ts.date_naive().to_string());
                if existing.insert(key) {
                    events.push(chat_event);
                }
            }
        }

        if events.is_empty() {
            return section;
        }

        section.total_events = events.len() as i64;
        let mut total_minutes = 0i64;
        let mut next_meeting_start: Option<chrono::DateTime<Utc>> = None;
        let mut items = Vec::new();

        for event in &events {
            let duration = event.duration_minutes().unwrap_or(0);
            total_minutes += duration;
            let start = event.start_time().and_then(|s| s.parse::<chrono::DateTime<Utc>>().ok());
            let time_display = start.map(|s| s.format("%H:%M").to_string()).unwrap_or_default();
            let attendees = event.attendees();

            items.push(CalendarEventItem {
                title: event.title.clone(),
                time: time_display.clone(),
                attendees: attendees.len() as i64,
                duration_minutes: duration,
            });

            if let Some(start) = start {
                if start > now && next_meeting_start.is_none_or(|current| start < current) {
                    next_meeting_start = Some(start);
                    section.next_meeting = event.title.clone();
                    section.next_meeting_time = time_display;
                }
            }
        }

        section.total_hours = (total_minutes as f64 / 60.0 * 10.0).round() / 10.0;
        section.events = items;
        section.conflicts = detect_conflicts(&events);
        section
    }

    fn collect_proposals(&self) -> ProposalSection {
        let mut section = ProposalSection::default();
        let pending = match self.store.list_pending_proposals() {
            Ok(pending) => pending,
            Err(err) => {
                tracing::warn!(error = %err, "failed to collect proposals");
                return section;
            }
        };
        section.total_pending = pending.len() as i64;
        for proposal in &pending {
            *section.by_type.entry(proposal.proposal_type.clone()).or_insert(0) += 1;
            if proposal.priority >= 3 {
                section.high_priority.push(HighPriorityProposal {
                    proposal_type: proposal.proposal_type.clone(),
                    title: proposal.title.clone(),
                    priority: proposal.priority as i64,
                });
            }
        }
        section
    }

    fn collect_observations(&self) -> Vec<String> {
        match self.store.list_observations(None, 0.0, 30) {
            Ok(observations) => observations
                .into_iter()
                .map(|o| format!("{}: {}", o.pattern_type, o.description))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "failed to collect observations");
                Vec::new()
            }
        }
    }

    /// Step-by-step human-readable format matching the Markdown layout
    /// the other interfaces (Telegram, CLI, API) all render as-is.
    pub fn format_text(data: &BriefingData) -> String {
        let mut lines = Vec::new();
        let title = match data.briefing_type.as_str() {
            "morning" => "\u{1F514} Morning Briefing",
            "evening" => "\u{1F319} Evening Summary",
            "weekly" => "\u{1F4CA} Weekly Review",
            _ => "\u{1F4CB} Briefing",
        };
        lines.push(format!("**{title} — {}**\n", data.date));

        if data.emails.total > 0 {
            lines.push("**\u{1F4E7} Email Overview**".to_string());
            lines.push(format!("• {} emails received → {} unread", data.emails.total, data.emails.unread));
            if data.emails.urgent > 0 {
                lines.push(format!("• \u{26A0}\u{FE0F} {} urgent — require attention", data.emails.urgent));
            }
            if data.emails.needs_response > 0 {
                lines.push(format!("• {} need your response", data.emails.needs_response));
            }
            if data.emails.drafts_ready > 0 {
                lines.push(format!("• \u{270F}\u{FE0F} {} draft responses ready", data.emails.drafts_ready));
            }
            if !data.emails.top_senders.is_empty() {
                lines.push(format!("• Top senders: {}", data.emails.top_senders.iter().take(3).cloned().collect::<Vec<_>>().join(", ")));
            }
            lines.push(String::new());
        }

        if data.calendar.total_events > 0 {
            lines.push("**\u{1F4C5} Today's Calendar**".to_string());
            lines.push(format!("• {} events ({:.1}h of meetings)", data.calendar.total_events, data.calendar.total_hours));
            if !data.calendar.next_meeting.is_empty() {
                lines.push(format!("• Next: {} at {}", data.calendar.next_meeting, data.calendar.next_meeting_time));
            }
            for event in data.calendar.events.iter().take(5) {
                lines.push(format!("  - {} {} ({} attendees)", event.time, event.title, event.attendees));
            }
            for conflict in &data.calendar.conflicts {
                lines.push(format!("  \u{26A0}\u{FE0F} Conflict: {conflict}"));
            }
            lines.push(String::new());
        }

        if data.proposals.total_pending > 0 {
            lines.push("**\u{1F3AF} Pending Actions**".to_string());
            lines.push(format!("• {} actions waiting for approval", data.proposals.total_pending));
            for item in data.proposals.high_priority.iter().take(3) {
                lines.push(format!("  - [{}] {}", item.proposal_type, item.title));
            }
            lines.push(String::new());
        }

        if !data.priorities.is_empty() {
            lines.push("**\u{1F3C6} Top Priorities Today**".to_string());
            for priority in data.priorities.iter().take(5) {
                lines.push(format!("{}. {}", priority.rank, priority.title));
                if !priority.reason.is_empty() {
                    lines.push(format!("   _{}_", priority.reason));
                }
            }
            lines.push(String::new());
        }

        if !data.observations.is_empty() {
            lines.push("**\u{1F4A1} Patterns Detected**".to_string());
            for obs in data.observations.iter().take(3) {
                lines.push(format!("• {obs}"));
            }
            lines.push(String::new());
        }

        if !data.memory_highlights.is_empty() {
            lines.push("**\u{1F9E0} Memory Notes**".to_string());
            for highlight in data.memory_highlights.iter().take(3) {
                lines.push(format!("• {highlight}"));
            }
            lines.push(String::new());
        }

        if data.emails.total == 0
            && data.calendar.total_events == 0
            && data.proposals.total_pending == 0
            && data.priorities.is_empty()
            && data.memory_highlights.is_empty()
        {
            lines.push("_All quiet today! Chat with me to get started — the more I know about you, the better your briefings get._".to_string());
        }

        lines.join("\n").trim().to_string()
    }
}

fn collect_memory_highlights(memory: &Memory) -> Vec<String> {
    let mut highlights = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let mut add = |text: String| {
        let key: String = text.chars().take(80).collect::<String>().to_lowercase();
        if seen.insert(key) {
            highlights.push(text);
        }
    };

    if let Ok(docs) = memory.get_recent(3, &SourceFilter::Named("observation".to_string()), None) {
        for doc in docs {
            if !doc.text.is_empty() {
                add(doc.text);
            }
        }
    }

    if let Ok(docs) = memory.get_recent(5, &SourceFilter::Named("conversation".to_string()), None) {
        for doc in docs {
            let text = doc.text.trim();
            if text.is_empty() {
                continue;
            }
            let mut text = text.to_string();
            if let Some(rest) = text.strip_prefix("User:") {
                let user_part = rest.split("\nAssistant:").next().unwrap_or("").trim();
                if user_part.len() < 10 {
                    continue;
                }
                text = user_part.to_string();
            }
            if text.chars().count() > 150 {
                text = format!("{}…", text.chars().take(147).collect::<String>().trim());
            }
            add(text);
        }
    }

    if let Ok(docs) = memory.get_recent(2, &SourceFilter::Named("profile".to_string()), None) {
        for doc in docs {
            if !doc.text.is_empty() {
                add(doc.text);
            }
        }
    }

    highlights
}

fn generate_priorities(data: &BriefingData) -> Vec<PriorityItem> {
    let mut priorities = Vec::new();
    let mut rank = 1;

    if data.emails.urgent > 0 {
        priorities.push(PriorityItem {
            rank,
            title: format!("Respond to {} urgent email(s)", data.emails.urgent),
            reason: "High urgency — time-sensitive".to_string(),
            source: "email".to_string(),
        });
        rank += 1;
    }

    if !data.calendar.next_meeting.is_empty() {
        priorities.push(PriorityItem {
            rank,
            title: format!("Prepare for: {}", data.calendar.next_meeting),
            reason: format!("Scheduled at {}", data.calendar.next_meeting_time),
            source: "calendar".to_string(),
        });
        rank += 1;
    }

    for proposal in data.proposals.high_priority.iter().take(2) {
        priorities.push(PriorityItem {
            rank,
            title: proposal.title.clone(),
            reason: "Action required — high priority".to_string(),
            source: "proposal".to_string(),
        });
        rank += 1;
    }

    if data.emails.drafts_ready > 0 {
        priorities.push(PriorityItem {
            rank,
            title: format!("Review {} draft response(s)", data.emails.drafts_ready),
            reason: "Draft responses ready for approval".to_string(),
            source: "email".to_string(),
        });
    }

    priorities.truncate(5);
    priorities
}

fn detect_conflicts(events: &[omnibrain_store::schema::Event]) -> Vec<String> {
    let parsed: Vec<_> = events
        .iter()
        .filter_map(|e| {
            let start = e.start_time()?.parse::<chrono::DateTime<Utc>>().ok()?;
            let end = e.end_time()?.parse::<chrono::DateTime<Utc>>().ok()?;
            Some((e.title.clone(), start, end))
        })
        .collect();

    let mut conflicts = Vec::new();
    for (i, (title_a, start_a, end_a)) in parsed.iter().enumerate() {
        for (title_b, start_b, end_b) in &parsed[i + 1..] {
            if start_a < end_b && start_b < end_a {
                conflicts.push(format!("{title_a} \u{2194} {title_b}"));
            }
        }
    }
    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::BriefingKind;
    use serde_json::json;

    fn store_with_email(urgency: &str, read: bool) -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .insert_event(
                "gmail",
                "email",
                "Quarterly numbers",
                "",
                &json!({"sender_email": "alice@example.com", "urgency": urgency, "is_read": read}),
                None,
                None,
            )
            .unwrap();
        store
    }

    #[test]
    fn collect_emails_tallies_unread_and_urgent() {
        let store = store_with_email("high", false);
        let generator = BriefingGenerator::new(store);
        let section = generator.collect_emails();
        assert_eq!(section.total, 1);
        assert_eq!(section.unread, 1);
        assert_eq!(section.urgent, 1);
        assert_eq!(section.top_senders, vec!["alice@example.com".to_string()]);
    }

    #[test]
    fn has_meaningful_data_is_false_for_empty_briefing() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let generator = BriefingGenerator::new(store);
        let data = generator.collect_data(BriefingKind::Morning);
        assert!(!data.has_meaningful_data());
    }

    #[test]
    fn has_meaningful_data_is_true_with_urgent_email() {
        let store = store_with_email("critical", false);
        let generator = BriefingGenerator::new(store);
        let data = generator.collect_data(BriefingKind::Morning);
        assert!(data.has_meaningful_data());
        assert!(!data.priorities.is_empty());
        assert_eq!(data.priorities[0].source, "email");
    }

    #[test]
    fn format_text_shows_all_quiet_when_nothing_collected() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let generator = BriefingGenerator::new(store);
        let (_, text) = generator.generate(BriefingKind::Morning);
        assert!(text.contains("All quiet today"));
    }

    #[test]
    fn format_text_includes_email_overview_section() {
        let store = store_with_email("high", false);
        let generator = BriefingGenerator::new(store);
        let (_, text) = generator.generate(BriefingKind::Morning);
        assert!(text.contains("Email Overview"));
        assert!(text.contains("1 emails received"));
    }

    #[test]
    fn detect_conflicts_flags_overlapping_events() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .insert_event(
                "calendar",
                "calendar_event",
                "Standup",
                "",
                &json!({"start_time": "2026-07-28T09:00:00Z", "end_time": "2026-07-28T09:30:00Z"}),
                None,
                None,
            )
            .unwrap();
        store
            .insert_event(
                "calendar",
                "calendar_event",
                "1:1",
                "",
                &json!({"start_time": "2026-07-28T09:15:00Z", "end_time": "2026-07-28T09:45:00Z"}),
                None,
                None,
            )
            .unwrap();
        let events = store.query_events(Some("calendar"), None, None, None, 10, false).unwrap();
        let conflicts = detect_conflicts(&events);
        assert_eq!(conflicts.len(), 1);
    }

    #[test]
    fn drafts_ready_counts_pending_email_draft_proposals() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.insert_proposal("email_draft", "Reply to Bob", "", &serde_json::Value::Null, 2, None).unwrap();
        store.insert_proposal("reminder", "Follow up", "", &serde_json::Value::Null, 2, None).unwrap();
        let generator = BriefingGenerator::new(store);
        let section = generator.collect_emails();
        assert_eq!(section.drafts_ready, 1);
    }
}
