//! Decouples [`BriefingGenerator`](crate::generator::BriefingGenerator)
//! from any concrete LLM provider, mirroring `omnibrain-chat`'s
//! `ChatAgent` trait.

use async_trait::async_trait;

#[async_trait]
pub trait NarrativeLlm: Send + Sync {
    /// Streams a completion to text; the generator only needs the final
    /// string, so implementations may buffer internally.
    async fn complete(&self, system: &str, prompt: &str) -> anyhow::Result<String>;
}
