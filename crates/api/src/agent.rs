//! A minimal single-shot [`ChatAgent`] backing `omnibrain-chat`'s
//! `AgentChatBridge`. spec.md's GLOSSARY and dataflow leave "Agent"
//! itself unspecified — only the `AgentEvent` stream crossing the
//! `AgentChatBridge` boundary is named — so this wires the bridge to one
//! `LlmRouter::chat_stream_with_fallback` call per turn rather than a
//! full tool-calling runtime.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use omnibrain_chat::{AgentEvent, AgentFactory, ChatAgent, EventStream};
use omnibrain_llm::{LlmRouter, Provider};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

const SYSTEM_PROMPT: &str = "You are Omnibrain, a personal AI chief of staff. Be concise and direct.";
const TOKEN_CHANNEL_CAPACITY: usize = 64;

/// Rough `chars/4` estimate — the router returns plain text, not a
/// token count, so this is a fallback for `omnibrain-chat`'s monthly
/// cost tracker, not a billing-accurate figure.
fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() / 4) as u32
}

pub struct LlmChatAgent {
    router: Arc<LlmRouter>,
    primary: Provider,
    ollama_model: String,
    openrouter_model: String,
    context: Mutex<String>,
}

enum RunState {
    Streaming { rx: ReceiverStream<String>, handle: tokio::task::JoinHandle<anyhow::Result<(Provider, String)>> },
    Draining(VecDeque<AgentEvent>),
}

#[async_trait]
impl ChatAgent for LlmChatAgent {
    async fn inject_context(&self, context: &str) {
        *self.context.lock().unwrap() = context.to_string();
    }

    async fn run(&self, message: &str) -> EventStream {
        let context = self.context.lock().unwrap().clone();
        let prompt = if context.is_empty() {
            format!("{SYSTEM_PROMPT}\n\n{message}")
        } else {
            format!("{SYSTEM_PROMPT}\n\n{context}\n\nUser: {message}")
        };

        let (tx, rx) = mpsc::channel::<String>(TOKEN_CHANNEL_CAPACITY);
        let router = self.router.clone();
        let primary = self.primary;
        let ollama_model = self.ollama_model.clone();
        let openrouter_model = self.openrouter_model.clone();
        let handle = tokio::spawn(async move {
            router.chat_stream_with_fallback(primary, &ollama_model, &openrouter_model, &prompt, tx).await
        });

        let initial = RunState::Streaming { rx: ReceiverStream::new(rx), handle };
        Box::pin(stream::unfold(initial, |state| async move {
            match state {
                RunState::Streaming { mut rx, handle } => match rx.next().await {
                    Some(delta) => Some((AgentEvent::Text { delta }, RunState::Streaming { rx, handle })),
                    None => {
                        let mut queue = VecDeque::new();
                        match handle.await {
                            Ok(Ok((_, text))) => {
                                queue.push_back(AgentEvent::Usage { input_tokens: 0, output_tokens: estimate_tokens(&text) });
                                queue.push_back(AgentEvent::Done);
                            }
                            Ok(Err(err)) => {
                                queue.push_back(AgentEvent::Error { message: err.to_string() });
                                queue.push_back(AgentEvent::Done);
                            }
                            Err(join_err) => {
                                queue.push_back(AgentEvent::Error { message: join_err.to_string() });
                                queue.push_back(AgentEvent::Done);
                            }
                        }
                        let next = queue.pop_front();
                        next.map(|event| (event, RunState::Draining(queue)))
                    }
                },
                RunState::Draining(mut queue) => queue.pop_front().map(|event| (event, RunState::Draining(queue))),
            }
        }))
    }
}

pub struct LlmAgentFactory {
    router: Arc<LlmRouter>,
    primary: Provider,
    ollama_model: String,
    openrouter_model: String,
}

impl LlmAgentFactory {
    pub fn new(router: Arc<LlmRouter>, primary: Provider, ollama_model: String, openrouter_model: String) -> Self {
        Self { router, primary, ollama_model, openrouter_model }
    }
}

#[async_trait]
impl AgentFactory for LlmAgentFactory {
    async fn build(&self, _session_id: &str) -> anyhow::Result<Arc<dyn ChatAgent>> {
        Ok(Arc::new(LlmChatAgent {
            router: self.router.clone(),
            primary: self.primary,
            ollama_model: self.ollama_model.clone(),
            openrouter_model: self.openrouter_model.clone(),
            context: Mutex::new(String::new()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_tokens_from_char_count() {
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens(""), 0);
    }
}
