//! Records every LLM invocation — spec.md §4.7.
//!
//! Two entry paths: a streaming wrapper that accumulates tokens and logs
//! on completion (success or drop-before-completion), and a post-hoc
//! hook for routers that only report totals. Grounded on
//! `crates/runtime/src/server/mod.rs`'s `safe_truncate` char-boundary
//! helper, reused here for the prompt-preview privacy cap.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::{Datelike, NaiveDate, Utc};
use futures::Stream;
use serde::Serialize;
use sha2::{Digest, Sha256};

use omnibrain_store::schema::LlmCallRecord;
use omnibrain_store::Store;

/// Prompts are never stored in full; `prompt_preview` is capped at 500
/// bytes, rounded down to a UTF-8 char boundary.
const PREVIEW_LIMIT: usize = 500;

fn safe_truncate(text: &str, limit: usize) -> &str {
    if limit >= text.len() {
        return text;
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Per-million-token USD pricing. Illustrative figures, not live pricing;
/// callers needing exact billing should override via
/// [`TransparencyLogger::with_pricing`].
fn default_pricing() -> HashMap<String, (f64, f64)> {
    HashMap::from([
        ("anthropic".to_string(), (3.0, 15.0)),
        ("openai".to_string(), (2.5, 10.0)),
        ("google".to_string(), (1.25, 5.0)),
        ("local".to_string(), (0.0, 0.0)),
    ])
}

fn estimate_cost(pricing: &HashMap<String, (f64, f64)>, provider: &str, input_tokens: i64, output_tokens: i64) -> f64 {
    let (input_rate, output_rate) = pricing.get(provider).copied().unwrap_or((0.0, 0.0));
    (input_tokens as f64 / 1_000_000.0) * input_rate + (output_tokens as f64 / 1_000_000.0) * output_rate
}

#[derive(Debug, Clone, Default)]
pub struct CallTotals {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cache_read_tokens: i64,
    pub cache_creation_tokens: i64,
}

pub struct TransparencyLogger {
    store: Arc<Store>,
    pricing: HashMap<String, (f64, f64)>,
}

impl TransparencyLogger {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            pricing: default_pricing(),
        }
    }

    pub fn with_pricing(mut self, pricing: HashMap<String, (f64, f64)>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Wraps a token stream so that regardless of how it ends — normal
    /// completion, an error midway, or simply being dropped — a call
    /// record is written exactly once.
    pub fn wrap_stream<S>(&self, provider: &str, model: &str, prompt: &str, source: &str, inner: S) -> LoggedTokenStream<S>
    where
        S: Stream<Item = String> + Unpin,
    {
        LoggedTokenStream {
            inner,
            store: self.store.clone(),
            pricing: self.pricing.clone(),
            provider: provider.to_string(),
            model: model.to_string(),
            source: source.to_string(),
            prompt_hash: prompt_hash(prompt),
            prompt_preview: safe_truncate(prompt, PREVIEW_LIMIT).to_string(),
            prompt_size: prompt.len() as i64,
            response_size: 0,
            start: Instant::now(),
            totals: CallTotals::default(),
            logged: false,
        }
    }

    /// Post-hoc hook: the router already knows totals and doesn't have a
    /// token stream to wrap. Logs with empty prompt/response bodies.
    #[allow(clippy::too_many_arguments)]
    pub fn log_totals(
        &self,
        provider: &str,
        model: &str,
        source: &str,
        totals: CallTotals,
        duration_ms: i64,
        success: bool,
        error_message: Option<String>,
    ) -> anyhow::Result<i64> {
        let cost_estimate = estimate_cost(&self.pricing, provider, totals.input_tokens, totals.output_tokens);
        let record = LlmCallRecord {
            id: 0,
            ts: Utc::now(),
            provider: provider.to_string(),
            model: model.to_string(),
            prompt_hash: String::new(),
            prompt_preview: String::new(),
            prompt_size: 0,
            response_size: 0,
            input_tokens: totals.input_tokens,
            output_tokens: totals.output_tokens,
            cache_read_tokens: totals.cache_read_tokens,
            cache_creation_tokens: totals.cache_creation_tokens,
            cost_estimate,
            source: source.to_string(),
            duration_ms,
            success,
            error_message,
        };
        Ok(self.store.insert_llm_call(&record)?)
    }

    pub fn get_calls(&self, provider: Option<&str>, limit: i64, offset: i64) -> anyhow::Result<Vec<LlmCallRecord>> {
        Ok(self.store.get_llm_calls(provider, limit, offset)?)
    }

    pub fn get_stats(&self, days: i64) -> anyhow::Result<CallStats> {
        let calls = self.store.get_llm_calls(None, 1_000_000, 0)?;
        let since = Utc::now() - chrono::Duration::days(days);
        let today = Utc::now().date_naive();
        let month_start = today.with_day(1).unwrap_or(today);

        let mut by_provider: HashMap<String, ProviderStats> = HashMap::new();
        let mut by_source: HashMap<String, ProviderStats> = HashMap::new();
        let mut cost_today = 0.0;
        let mut cost_month = 0.0;

        for call in calls.iter().filter(|c| c.ts >= since) {
            let entry = by_provider.entry(call.provider.clone()).or_default();
            entry.calls += 1;
            entry.cost += call.cost_estimate;
            entry.input_tokens += call.input_tokens;
            entry.output_tokens += call.output_tokens;

            let entry = by_source.entry(call.source.clone()).or_default();
            entry.calls += 1;
            entry.cost += call.cost_estimate;
            entry.input_tokens += call.input_tokens;
            entry.output_tokens += call.output_tokens;

            let call_date = call.ts.date_naive();
            if call_date == today {
                cost_today += call.cost_estimate;
            }
            if call_date >= month_start {
                cost_month += call.cost_estimate;
            }
        }

        Ok(CallStats {
            by_provider,
            by_source,
            total_calls: calls.iter().filter(|c| c.ts >= since).count(),
            cost_today,
            cost_month_to_date: cost_month,
        })
    }

    pub fn get_daily_costs(&self, days: i64) -> anyhow::Result<Vec<DailyCost>> {
        let calls = self.store.get_llm_calls(None, 1_000_000, 0)?;
        let since = Utc::now() - chrono::Duration::days(days);
        let mut by_day: HashMap<NaiveDate, f64> = HashMap::new();
        for call in calls.iter().filter(|c| c.ts >= since) {
            *by_day.entry(call.ts.date_naive()).or_insert(0.0) += call.cost_estimate;
        }
        let mut out: Vec<DailyCost> = by_day
            .into_iter()
            .map(|(date, cost)| DailyCost { date, cost })
            .collect();
        out.sort_by_key(|d| d.date);
        Ok(out)
    }

    pub fn prune(&self, days: i64) -> anyhow::Result<usize> {
        Ok(self.store.prune_llm_calls(days)?)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStats {
    pub calls: i64,
    pub cost: f64,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CallStats {
    pub by_provider: HashMap<String, ProviderStats>,
    pub by_source: HashMap<String, ProviderStats>,
    pub total_calls: usize,
    pub cost_today: f64,
    pub cost_month_to_date: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyCost {
    pub date: NaiveDate,
    pub cost: f64,
}

/// Wraps an async token stream; logs a [`LlmCallRecord`] exactly once,
/// whichever of completion, error, or drop happens first.
pub struct LoggedTokenStream<S> {
    inner: S,
    store: Arc<Store>,
    pricing: HashMap<String, (f64, f64)>,
    provider: String,
    model: String,
    source: String,
    prompt_hash: String,
    prompt_preview: String,
    prompt_size: i64,
    response_size: i64,
    start: Instant,
    totals: CallTotals,
    logged: bool,
}

impl<S> LoggedTokenStream<S> {
    /// Lets the caller report token usage once it's known (e.g. from a
    /// final SSE event), ahead of stream completion.
    pub fn set_totals(&mut self, totals: CallTotals) {
        self.totals = totals;
    }

    fn write_record(&mut self, success: bool, error_message: Option<String>) {
        if self.logged {
            return;
        }
        self.logged = true;
        let cost_estimate = estimate_cost(&self.pricing, &self.provider, self.totals.input_tokens, self.totals.output_tokens);
        let record = LlmCallRecord {
            id: 0,
            ts: Utc::now(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            prompt_hash: self.prompt_hash.clone(),
            prompt_preview: self.prompt_preview.clone(),
            prompt_size: self.prompt_size,
            response_size: self.response_size,
            input_tokens: self.totals.input_tokens,
            output_tokens: self.totals.output_tokens,
            cache_read_tokens: self.totals.cache_read_tokens,
            cache_creation_tokens: self.totals.cache_creation_tokens,
            cost_estimate,
            source: self.source.clone(),
            duration_ms: self.start.elapsed().as_millis() as i64,
            success,
            error_message,
        };
        if let Err(err) = self.store.insert_llm_call(&record) {
            tracing::error!(error = %err, "failed to persist llm call record");
        }
    }
}

impl<S: Stream<Item = String> + Unpin> Stream for LoggedTokenStream<S> {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(token)) => {
                this.response_size += token.len() as i64;
                Poll::Ready(Some(token))
            }
            Poll::Ready(None) => {
                this.write_record(true, None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for LoggedTokenStream<S> {
    fn drop(&mut self) {
        if !self.logged {
            self.write_record(false, Some("stream dropped before completion".to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use futures::StreamExt;

    #[test]
    fn prompt_preview_is_capped_and_hash_is_sha256() {
        let long = "x".repeat(1000);
        assert_eq!(safe_truncate(&long, PREVIEW_LIMIT).len(), PREVIEW_LIMIT);
        assert_eq!(prompt_hash("hello").len(), 64);
    }

    #[tokio::test]
    async fn stream_completion_logs_success() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let logger = TransparencyLogger::new(store.clone());
        let inner = stream::iter(vec!["hi".to_string(), " there".to_string()]);
        let mut logged = logger.wrap_stream("anthropic", "claude", "full prompt body", "chat", inner);
        while logged.next().await.is_some() {}
        drop(logged);
        let calls = store.get_llm_calls(None, 10, 0).unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].success);
        assert_eq!(calls[0].prompt_preview.len(), "full prompt body".len());
    }

    #[tokio::test]
    async fn dropped_stream_logs_failure_exactly_once() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let logger = TransparencyLogger::new(store.clone());
        let inner = stream::iter(vec!["partial".to_string()]);
        let logged = logger.wrap_stream("anthropic", "claude", "prompt", "chat", inner);
        drop(logged);
        let calls = store.get_llm_calls(None, 10, 0).unwrap();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].success);
    }

    #[test]
    fn log_totals_uses_empty_prompt_fields() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let logger = TransparencyLogger::new(store.clone());
        logger
            .log_totals(
                "openai",
                "gpt",
                "router",
                CallTotals { input_tokens: 100, output_tokens: 50, ..Default::default() },
                120,
                true,
                None,
            )
            .unwrap();
        let calls = store.get_llm_calls(None, 10, 0).unwrap();
        assert_eq!(calls[0].prompt_preview, "");
        assert!(calls[0].cost_estimate > 0.0);
    }

    #[test]
    fn prune_removes_calls_older_than_cutoff() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let logger = TransparencyLogger::new(store.clone());
        logger
            .log_totals("local", "m", "s", CallTotals::default(), 0, true, None)
            .unwrap();
        let removed = logger.prune(365).unwrap();
        assert_eq!(removed, 0);
    }
}
