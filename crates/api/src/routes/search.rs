use axum::extract::{Query, State};
use axum::Json;
use omnibrain_memory::SourceFilter;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::ApiState;

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_limit() -> usize {
    10
}
fn default_source() -> String {
    "all".to_string()
}

pub async fn search(State(state): State<ApiState>, Query(q): Query<SearchQuery>) -> ApiResult<Json<Value>> {
    let Some(memory) = state.resources.memory.clone() else {
        return Err(ApiError::Unavailable("Memory search not available".to_string()));
    };
    let limit = q.limit.clamp(1, 50);
    let filter = SourceFilter::from_str(&q.source);
    let results = memory.search(&q.q, limit, &filter, None)?;
    let count = results.len();
    let results: Vec<Value> = results
        .into_iter()
        .map(|doc| {
            json!({
                "id": doc.id,
                "text": doc.text.chars().take(500).collect::<String>(),
                "source": doc.source,
                "source_type": doc.source_type,
                "score": doc.score,
            })
        })
        .collect();
    Ok(Json(json!({ "query": q.q, "results": results, "count": count })))
}
