//! Optional Qdrant-backed vector store — spec.md §4.2's "optional vector
//! store". Substitutes for the original's ChromaDB dependency: no pack
//! example speaks Chroma's wire protocol, and `qdrant-client` was already
//! an optional dependency of the teacher's memory crate.

use std::sync::Arc;

use anyhow::Context;
use qdrant_client::qdrant::{
    Condition, Filter, PointStruct, SearchPoints, UpsertPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use serde_json::Value;
use tokio::runtime::Runtime;

pub trait VectorStore: Send + Sync {
    fn upsert(&self, id: &str, text: &str, metadata: &Value) -> anyhow::Result<()>;
    fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>>;
    fn delete(&self, id: &str) -> anyhow::Result<()>;
}

/// Wraps an async Qdrant client behind a synchronous facade, matching the
/// rest of `omnibrain-memory`'s blocking call style. Embeddings are
/// supplied by the caller via `embed_fn`; this store only persists and
/// searches them.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
    runtime: Runtime,
    embed_fn: Arc<dyn Fn(&str) -> anyhow::Result<Vec<f32>> + Send + Sync>,
}

impl QdrantVectorStore {
    pub fn connect(
        url: &str,
        collection: &str,
        embed_fn: Arc<dyn Fn(&str) -> anyhow::Result<Vec<f32>> + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let runtime = Runtime::new().context("failed to start qdrant runtime")?;
        let client = runtime.block_on(Qdrant::from_url(url).build())?;
        Ok(Self {
            client,
            collection: collection.to_string(),
            runtime,
            embed_fn,
        })
    }
}

impl VectorStore for QdrantVectorStore {
    fn upsert(&self, id: &str, text: &str, metadata: &Value) -> anyhow::Result<()> {
        let embedding = (self.embed_fn)(text)?;
        let mut payload = std::collections::HashMap::new();
        payload.insert("doc_id".to_string(), QdrantValue::from(id));
        if let Value::Object(map) = metadata {
            for (k, v) in map {
                payload.insert(k.clone(), QdrantValue::from(v.to_string()));
            }
        }
        let point = PointStruct::new(id.to_string(), embedding, payload);
        self.runtime.block_on(
            self.client
                .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point])),
        )?;
        Ok(())
    }

    fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>> {
        let embedding = (self.embed_fn)(query)?;
        let response = self.runtime.block_on(self.client.search_points(SearchPoints {
            collection_name: self.collection.clone(),
            vector: embedding,
            limit: limit as u64,
            with_payload: Some(true.into()),
            ..Default::default()
        }))?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| point.payload.get("doc_id").and_then(|v| v.as_str().map(str::to_string)))
            .collect())
    }

    fn delete(&self, id: &str) -> anyhow::Result<()> {
        let filter = Filter::must([Condition::matches("doc_id", id.to_string())]);
        self.runtime.block_on(
            self.client
                .delete_points(qdrant_client::qdrant::DeletePointsBuilder::new(self.collection.clone()).points(filter)),
        )?;
        Ok(())
    }
}
