//! Fire-and-forget structured-data extraction from a finished chat turn
//! — spec.md §4.10 step 5d. Triggered only when the turn used no tools;
//! an implementation mines the dialog for events/contacts worth
//! persisting. The concrete NLP/LLM strategy is out of scope here.

use async_trait::async_trait;

#[async_trait]
pub trait ConversationExtractor: Send + Sync {
    async fn extract(&self, session_id: &str, dialog: &str) -> anyhow::Result<()>;
}
