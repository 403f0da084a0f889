use axum::extract::State;
use axum::Json;
use omnibrain_memory::SourceFilter;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

const MEMORY_CONTEXT_RESULTS: usize = 3;

#[derive(Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// `POST /api/v1/message` — a non-streaming single-shot reply, distinct
/// from `/chat`'s SSE turn loop.
pub async fn process_message(State(state): State<ApiState>, Json(body): Json<MessageRequest>) -> ApiResult<Json<Value>> {
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Empty message".to_string()));
    }

    let mut memory_context = String::new();
    if let Some(memory) = state.resources.memory.clone() {
        if let Ok(results) = memory.search(&body.text, MEMORY_CONTEXT_RESULTS, &SourceFilter::All, None) {
            memory_context = results
                .iter()
                .map(|doc| doc.text.chars().take(200).collect::<String>())
                .collect::<Vec<_>>()
                .join("\n");
        }
    }

    let Some(router) = state.resources.llm.clone() else {
        let response = if memory_context.is_empty() {
            "I'm OmniBrain. No LLM API key is configured yet — check your .env file.".to_string()
        } else {
            memory_context.clone()
        };
        let source = if memory_context.is_empty() { "none" } else { "memory" };
        return Ok(Json(json!({ "response": response, "source": source })));
    };

    let mut prompt = body.text.clone();
    if !memory_context.is_empty() {
        prompt = format!("Relevant memories:\n{memory_context}\n\n{prompt}");
    }

    let models = &state.llm_models;
    match router
        .chat_with_fallback(models.primary, &models.ollama_model, &models.openrouter_model, &prompt)
        .await
    {
        Ok((_, text)) => {
            if let Some(memory) = state.resources.memory.clone() {
                if !text.trim().is_empty() {
                    let dialog = format!("User: {}\nAssistant: {}", body.text, &text.chars().take(500).collect::<String>());
                    let _ = memory.store(&dialog, None, "chat", "conversation", Vec::new(), Value::Null);
                }
            }
            Ok(Json(json!({ "response": text, "source": "llm" })))
        }
        Err(err) => {
            tracing::error!(error = %err, "LLM call failed in /message");
            if memory_context.is_empty() {
                Ok(Json(json!({ "response": "I'm OmniBrain. No LLM API key is configured yet — check your .env file.", "source": "none" })))
            } else {
                Ok(Json(json!({ "response": memory_context, "source": "memory" })))
            }
        }
    }
}
