//! Stateless cross-store query engine — spec.md §4.5.
//!
//! Dispatches a natural-language question onto one of three strategies
//! by shape, then falls back to a merged keyword + event search.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use omnibrain_memory::{Memory, SourceFilter};
use omnibrain_store::schema::{Contact, Event};
use omnibrain_store::Store;

static WHO_SAID_WHAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)what (?:did|has) ([\w .]+?) (?:say|mention|said|mentioned) about ([\w .]+?)\??$|([\w .]+?)'s thoughts on ([\w .]+?)\??$|cosa ha detto ([\w .]+?) (?:su|riguardo a) ([\w .]+?)\??$|qu[eé] (?:dijo|menciona) ([\w .]+?) (?:sobre|acerca de) ([\w .]+?)\??$",
    )
    .unwrap()
});

static TIMELINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:timeline|history|evolution) of (.+?)\??$").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct CorrelatedItem {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub snippet: String,
    pub source: String,
    pub kind: &'static str,
}

impl CorrelatedItem {
    fn from_event(e: &Event) -> Self {
        Self {
            id: format!("event:{}", e.id),
            ts: e.ts,
            snippet: format!("{}: {}", e.title, e.body),
            source: e.source.clone(),
            kind: "event",
        }
    }

    fn from_document(d: &omnibrain_memory::Document) -> Self {
        Self {
            id: format!("memory:{}", d.id),
            ts: d.ts,
            snippet: d.text.clone(),
            source: d.source.clone(),
            kind: "memory",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactEdge {
    pub a: String,
    pub b: String,
    pub shared_events: u32,
    pub shared_threads: u32,
    pub strength: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactSummary {
    pub contact: Contact,
    pub total_interactions: i64,
    pub top_relationships: Vec<ContactEdge>,
    pub recent_topics: Vec<CorrelatedItem>,
}

pub struct KnowledgeGraph {
    store: Arc<Store>,
    memory: Arc<Memory>,
}

impl KnowledgeGraph {
    pub fn new(store: Arc<Store>, memory: Arc<Memory>) -> Self {
        Self { store, memory }
    }

    /// Dispatches on question shape; `Correlate` is the fallback for
    /// anything that doesn't look like a who-said-what or timeline ask.
    pub fn ask(&self, question: &str, days: i64, max_results: usize) -> anyhow::Result<Vec<CorrelatedItem>> {
        if let Some(caps) = WHO_SAID_WHAT_RE.captures(question) {
            let (person, topic) = extract_person_topic(&caps);
            if let (Some(person), Some(topic)) = (person, topic) {
                return self.who_said_what(&person, &topic, max_results);
            }
        }
        if let Some(caps) = TIMELINE_RE.captures(question) {
            if let Some(topic) = caps.get(1) {
                return self.get_topic_timeline(topic.as_str(), days, max_results);
            }
        }
        self.correlate(question, days, max_results)
    }

    pub fn who_said_what(&self, person: &str, topic: &str, max_results: usize) -> anyhow::Result<Vec<CorrelatedItem>> {
        let query = format!("{person} {topic}");
        let person_lower = person.to_lowercase();

        let docs = self.memory.search(&query, max_results * 2, &SourceFilter::All, None)?;
        let mut items: Vec<CorrelatedItem> = docs
            .iter()
            .filter(|d| d.text.to_lowercase().contains(&person_lower) || d.source.to_lowercase().contains(&person_lower))
            .map(CorrelatedItem::from_document)
            .collect();

        let events = self.store.fts_search_events(&omnibrain_memory::sanitize_fts_query(topic), (max_results * 2) as i64)?;
        items.extend(
            events
                .iter()
                .filter(|e| {
                    e.title.to_lowercase().contains(&person_lower)
                        || e.body.to_lowercase().contains(&person_lower)
                        || e.metadata.to_string().to_lowercase().contains(&person_lower)
                })
                .map(CorrelatedItem::from_event),
        );

        dedupe_sort_cap(items, max_results, true)
    }

    pub fn get_contact_graph(&self, contact: Option<&str>, min_strength: f32, days: i64) -> anyhow::Result<Vec<ContactEdge>> {
        let since = Utc::now() - chrono::Duration::days(days);
        let events = self.store.query_events(None, None, Some(since), None, 100_000, false)?;

        let mut pair_counts: HashMap<(String, String), (u32, u32)> = HashMap::new();
        for event in &events {
            let mut participants: Vec<String> = event.attendees();
            if event.source.contains('@') {
                participants.push(event.source.clone());
            }
            participants.sort();
            participants.dedup();

            let is_calendar = event.event_type == "calendar_event" || event.source == "calendar";
            for i in 0..participants.len() {
                for j in (i + 1)..participants.len() {
                    let key = ordered_pair(&participants[i], &participants[j]);
                    let entry = pair_counts.entry(key).or_insert((0, 0));
                    if is_calendar {
                        entry.0 += 1;
                    } else {
                        entry.1 += 1;
                    }
                }
            }
        }

        let mut edges: Vec<ContactEdge> = pair_counts
            .into_iter()
            .map(|((a, b), (shared_events, shared_threads))| {
                let strength = ((shared_events + shared_threads) as f32 / 10.0).min(1.0);
                ContactEdge { a, b, shared_events, shared_threads, strength }
            })
            .filter(|e| e.strength >= min_strength)
            .filter(|e| contact.is_none_or(|c| e.a == c || e.b == c))
            .collect();

        edges.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(std::cmp::Ordering::Equal));
        Ok(edges)
    }

    pub fn get_topic_timeline(&self, topic: &str, days: i64, max_results: usize) -> anyhow::Result<Vec<CorrelatedItem>> {
        let docs = self.memory.search(topic, max_results * 2, &SourceFilter::All, Some(days))?;
        let events = self.store.fts_search_events(&omnibrain_memory::sanitize_fts_query(topic), (max_results * 2) as i64)?;

        let mut items: Vec<CorrelatedItem> = docs.iter().map(CorrelatedItem::from_document).collect();
        items.extend(events.iter().map(CorrelatedItem::from_event));

        dedupe_sort_cap(items, max_results, false)
    }

    pub fn correlate(&self, query: &str, days: i64, max_results: usize) -> anyhow::Result<Vec<CorrelatedItem>> {
        let docs = self.memory.search(query, max_results, &SourceFilter::All, Some(days))?;
        let events = self.store.fts_search_events(&omnibrain_memory::sanitize_fts_query(query), max_results as i64)?;

        let mut items: Vec<CorrelatedItem> = docs.iter().map(CorrelatedItem::from_document).collect();
        items.extend(events.iter().map(CorrelatedItem::from_event));

        dedupe_sort_cap(items, max_results, true)
    }

    pub fn get_contact_summary(&self, identifier: &str) -> anyhow::Result<Option<ContactSummary>> {
        let contact = if let Some(c) = self.store.get_contact(identifier)? {
            Some(c)
        } else {
            let lower = identifier.to_lowercase();
            self.store
                .list_contacts(1000)?
                .into_iter()
                .find(|c| c.name.to_lowercase().contains(&lower))
        };
        let Some(contact) = contact else { return Ok(None) };

        let edges = self.get_contact_graph(Some(&contact.email), 0.0, 365)?;
        let recent_topics = self.correlate(&contact.name, 90, 10)?;

        Ok(Some(ContactSummary {
            total_interactions: contact.interaction_count,
            top_relationships: edges.into_iter().take(5).collect(),
            recent_topics,
            contact,
        }))
    }
}

fn extract_person_topic(caps: &regex::Captures) -> (Option<String>, Option<String>) {
    for (person_idx, topic_idx) in [(1, 2), (3, 4), (5, 6), (7, 8)] {
        if let (Some(person), Some(topic)) = (caps.get(person_idx), caps.get(topic_idx)) {
            return (Some(person.as_str().trim().to_string()), Some(topic.as_str().trim().to_string()));
        }
    }
    (None, None)
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

fn dedupe_sort_cap(mut items: Vec<CorrelatedItem>, max_results: usize, descending: bool) -> anyhow::Result<Vec<CorrelatedItem>> {
    let mut seen = std::collections::HashSet::new();
    items.retain(|item| seen.insert(item.id.clone()));
    if descending {
        items.sort_by(|a, b| b.ts.cmp(&a.ts));
    } else {
        items.sort_by(|a, b| a.ts.cmp(&b.ts));
    }
    items.truncate(max_results);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnibrain_store::schema::Relationship;

    fn graph() -> KnowledgeGraph {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let memory = Arc::new(Memory::new(store.clone()));
        KnowledgeGraph::new(store, memory)
    }

    #[test]
    fn who_said_what_regex_matches_question_shape() {
        let caps = WHO_SAID_WHAT_RE.captures("What did Marco say about pricing?").unwrap();
        let (person, topic) = extract_person_topic(&caps);
        assert_eq!(person.unwrap(), "Marco");
        assert_eq!(topic.unwrap(), "pricing");
    }

    #[test]
    fn timeline_regex_extracts_topic() {
        let caps = TIMELINE_RE.captures("timeline of the acquisition deal").unwrap();
        assert_eq!(caps.get(1).unwrap().as_str(), "the acquisition deal");
    }

    #[test]
    fn who_said_what_filters_by_person_mention() {
        let g = graph();
        g.memory
            .store_email("marco@example.com", "Pricing", "Marco said the price is fixed", "gmail:1", vec![])
            .unwrap();
        g.memory
            .store_email("ada@example.com", "Pricing", "Ada has no opinion on pricing", "gmail:2", vec![])
            .unwrap();
        let results = g.who_said_what("Marco", "pricing", 10).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn contact_graph_builds_pairwise_strength() {
        let g = graph();
        g.store
            .insert_event(
                "calendar",
                "calendar_event",
                "Sync",
                "",
                &serde_json::json!({"attendees": ["a@x.com", "b@x.com"]}),
                None,
                None,
            )
            .unwrap();
        let edges = g.get_contact_graph(None, 0.0, 30).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].shared_events, 1);
    }

    #[test]
    fn contact_summary_resolves_by_fuzzy_name() {
        let g = graph();
        g.store
            .upsert_contact_by_name("Marco Rossi", Relationship::Client, None)
            .unwrap();
        let summary = g.get_contact_summary("marco").unwrap();
        assert!(summary.is_some());
        assert_eq!(summary.unwrap().contact.name, "Marco Rossi");
    }

    #[test]
    fn contact_summary_returns_none_when_unresolved() {
        let g = graph();
        assert!(g.get_contact_summary("nobody").unwrap().is_none());
    }
}
