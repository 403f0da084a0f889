//! Unified memory facade — spec.md §4.2.
//!
//! A mandatory keyword store (FTS5, via `omnibrain-store`) backs every
//! write; an optional vector store is consulted first on read and its
//! failure is never fatal. Grounded on the teacher's `index.rs` hashing
//! and LRU conventions, generalized from a write-through cache over a
//! JSONL log to a facade over two independent stores.

pub mod sanitize;
#[cfg(feature = "vector")]
pub mod vector;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use omnibrain_store::schema::MemoryDocument;
use omnibrain_store::Store;

pub use sanitize::sanitize_fts_query;

#[cfg(feature = "vector")]
pub use vector::{QdrantVectorStore, VectorStore};

/// `source_filter` values a caller may pass to [`Memory::search`] /
/// [`Memory::get_recent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFilter {
    All,
    Named(String),
}

impl SourceFilter {
    pub fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("all") || s.is_empty() {
            SourceFilter::All
        } else {
            SourceFilter::Named(s.to_string())
        }
    }

    fn as_source_type(&self) -> Option<&str> {
        match self {
            SourceFilter::All => None,
            SourceFilter::Named(s) => Some(s.as_str()),
        }
    }
}

pub type Document = MemoryDocument;

/// First 16 hex characters of `sha256("{source}:{text[:200]}")`.
pub fn document_id(source: &str, text: &str) -> String {
    let truncated: String = text.chars().take(200).collect();
    let mut hasher = Sha256::new();
    hasher.update(format!("{source}:{truncated}").as_bytes());
    let digest = hasher.finalize();
    format!("{digest:x}")[..16].to_string()
}

#[cfg(not(feature = "vector"))]
pub trait VectorStore: Send + Sync {
    fn upsert(&self, id: &str, text: &str, metadata: &Value) -> anyhow::Result<()>;
    fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>>;
    fn delete(&self, id: &str) -> anyhow::Result<()>;
}

pub struct Memory {
    store: Arc<Store>,
    vector: Option<Arc<dyn VectorStore>>,
}

impl Memory {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, vector: None }
    }

    pub fn with_vector_store(store: Arc<Store>, vector: Arc<dyn VectorStore>) -> Self {
        Self {
            store,
            vector: Some(vector),
        }
    }

    /// Writes to both stores. A vector-store failure is logged and
    /// swallowed; the keyword store remains authoritative.
    pub fn store(
        &self,
        text: &str,
        id: Option<&str>,
        source: &str,
        source_type: &str,
        contacts: Vec<String>,
        metadata: Value,
    ) -> anyhow::Result<String> {
        let doc_id = id.map(|s| s.to_string()).unwrap_or_else(|| document_id(source, text));
        let doc = MemoryDocument {
            id: doc_id.clone(),
            text: text.to_string(),
            source: source.to_string(),
            source_type: source_type.to_string(),
            ts: Utc::now(),
            contacts,
            metadata,
            score: 0.0,
        };
        self.store.upsert_memory_document(&doc)?;

        if let Some(vector) = &self.vector {
            if let Err(err) = vector.upsert(&doc_id, text, &doc.metadata) {
                tracing::warn!(error = %err, doc_id, "vector store upsert failed, continuing with keyword store only");
            }
        }
        Ok(doc_id)
    }

    /// Consults the vector store first if configured; falls back to the
    /// keyword store when the vector store is empty, unavailable, or errors.
    /// `time_range_days`, when given, drops any document older than that
    /// many days on either path.
    pub fn search(
        &self,
        query: &str,
        max_results: usize,
        source_filter: &SourceFilter,
        time_range_days: Option<i64>,
    ) -> anyhow::Result<Vec<Document>> {
        let since = time_range_days.map(|days| Utc::now() - chrono::Duration::days(days));

        if let Some(vector) = &self.vector {
            match vector.search(query, max_results) {
                Ok(ids) if !ids.is_empty() => {
                    let mut docs = Vec::new();
                    for id in ids {
                        if let Some(doc) = self.store.get_memory_document(&id)? {
                            let in_range = since.is_none_or(|cutoff| doc.ts >= cutoff);
                            if in_range && source_filter.as_source_type().is_none_or(|s| doc.source_type == s) {
                                docs.push(doc);
                            }
                        }
                    }
                    if !docs.is_empty() {
                        return Ok(docs);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "vector search failed, falling back to keyword store");
                }
            }
        }

        let sanitized = sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let since_rfc3339 = since.map(|ts| ts.to_rfc3339());
        let mut docs = self.store.fts_search_memory(&sanitized, max_results as i64, since_rfc3339.as_deref())?;
        if let Some(source_type) = source_filter.as_source_type() {
            docs.retain(|d| d.source_type == source_type);
        }
        Ok(docs)
    }

    pub fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Document>> {
        Ok(self.store.get_memory_document(id)?)
    }

    pub fn get_recent(
        &self,
        max_results: usize,
        source_filter: &SourceFilter,
        time_range_days: Option<i64>,
    ) -> anyhow::Result<Vec<Document>> {
        let since = time_range_days.map(|days| (Utc::now() - chrono::Duration::days(days)).to_rfc3339());
        Ok(self.store.recent_memory_documents(
            max_results as i64,
            source_filter.as_source_type(),
            since.as_deref(),
        )?)
    }

    pub fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.store.delete_memory_document(id)?;
        if let Some(vector) = &self.vector {
            if let Err(err) = vector.delete(id) {
                tracing::warn!(error = %err, id, "vector store delete failed");
            }
        }
        Ok(())
    }

    /// Authoritative count comes from the keyword store.
    pub fn count(&self) -> anyhow::Result<i64> {
        Ok(self.store.count_memory_documents()?)
    }

    // ── convenience constructors ────────────────────────────────────────

    pub fn store_email(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        source_id: &str,
        contacts: Vec<String>,
    ) -> anyhow::Result<String> {
        let text = format!("Email from {sender}: {subject}\n\n{body}");
        self.store(
            &text,
            None,
            source_id,
            "email",
            contacts,
            serde_json::json!({"sender": sender, "subject": subject}),
        )
    }

    pub fn store_calendar_event(
        &self,
        title: &str,
        description: &str,
        location: &str,
        attendees: &[String],
        source_id: &str,
    ) -> anyhow::Result<String> {
        let csv = attendees.join(", ");
        let text = format!("Calendar event: {title}\n{description}\nLocation: {location}\nAttendees: {csv}");
        self.store(
            &text,
            None,
            source_id,
            "calendar",
            attendees.to_vec(),
            serde_json::json!({"title": title, "location": location}),
        )
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Memory {
        Memory::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    #[test]
    fn document_id_is_deterministic_and_16_hex_chars() {
        let a = document_id("gmail", "hello world");
        let b = document_id("gmail", "hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn document_id_truncates_at_200_chars() {
        let long = "x".repeat(500);
        let a = document_id("gmail", &long);
        let truncated = "x".repeat(200);
        let b = document_id("gmail", &truncated);
        assert_eq!(a, b);
    }

    #[test]
    fn store_and_search_round_trip() {
        let mem = memory();
        mem.store_email("marco@example.com", "Pricing", "Let's discuss pricing", "gmail:1", vec![])
            .unwrap();
        let results = mem.search("pricing", 10, &SourceFilter::All, None).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn empty_sanitized_query_returns_empty() {
        let mem = memory();
        mem.store_email("a@b.com", "x", "y", "gmail:1", vec![]).unwrap();
        let results = mem.search("!!!###", 10, &SourceFilter::All, None).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_filters_by_source_type() {
        let mem = memory();
        mem.store_email("a@b.com", "Pricing call", "details", "gmail:1", vec![]).unwrap();
        mem.store_calendar_event("Pricing call", "sync up", "Zoom", &[], "cal:1")
            .unwrap();
        let results = mem
            .search("pricing", 10, &SourceFilter::Named("calendar".to_string()), None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_type, "calendar");
    }

    #[test]
    fn search_excludes_documents_older_than_time_range() {
        let mem = memory();
        let id = mem.store_email("a@b.com", "Pricing call", "details", "gmail:1", vec![]).unwrap();
        let mut old = mem.store.get_memory_document(&id).unwrap().unwrap();
        old.ts = Utc::now() - chrono::Duration::days(30);
        mem.store.upsert_memory_document(&old).unwrap();

        let unfiltered = mem.search("pricing", 10, &SourceFilter::All, None).unwrap();
        assert_eq!(unfiltered.len(), 1);

        let filtered = mem.search("pricing", 10, &SourceFilter::All, Some(7)).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn get_recent_excludes_documents_older_than_time_range() {
        let mem = memory();
        let id = mem.store_email("a@b.com", "x", "y", "gmail:1", vec![]).unwrap();
        let mut old = mem.store.get_memory_document(&id).unwrap().unwrap();
        old.ts = Utc::now() - chrono::Duration::days(30);
        mem.store.upsert_memory_document(&old).unwrap();

        let unfiltered = mem.get_recent(10, &SourceFilter::All, None).unwrap();
        assert_eq!(unfiltered.len(), 1);

        let filtered = mem.get_recent(10, &SourceFilter::All, Some(7)).unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn count_reflects_keyword_store() {
        let mem = memory();
        assert_eq!(mem.count().unwrap(), 0);
        mem.store_email("a@b.com", "x", "y", "gmail:1", vec![]).unwrap();
        assert_eq!(mem.count().unwrap(), 1);
    }

    #[test]
    fn delete_removes_document() {
        let mem = memory();
        let id = mem.store_email("a@b.com", "x", "y", "gmail:1", vec![]).unwrap();
        mem.delete(&id).unwrap();
        assert!(mem.get_by_id(&id).unwrap().is_none());
    }
}
