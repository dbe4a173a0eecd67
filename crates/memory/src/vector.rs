//! Long-term memory vector store.
//!
//! One qdrant collection holds every extracted fact as a 384-dim point with
//! a `{content: …}` payload.  Consumers go through [`VectorMemory`] so the
//! update pipeline can be exercised against an in-memory double.

use anyhow::{Context, Result};
use async_trait::async_trait;
use modelchain_encoder::EMBEDDING_DIM;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    QueryPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, point_id::PointIdOptions,
    value::Kind,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

pub const LONG_TERM_COLLECTION: &str = "long_term_memory";

/// Store-assigned identity of a long-term memory point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryKey {
    Num(u64),
    Uuid(String),
}

/// One retrieval hit: the point's identity, its fact text, and similarity.
#[derive(Debug, Clone)]
pub struct MemoryHit {
    pub key: MemoryKey,
    pub content: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorMemory: Send + Sync {
    /// Make sure the backing collection exists.
    async fn ensure_ready(&self) -> Result<()>;

    /// Insert a new fact under a fresh id.
    async fn add(&self, content: &str, vector: Vec<f32>) -> Result<()>;

    /// Replace an existing point's payload and vector.
    async fn update(&self, key: &MemoryKey, content: &str, vector: Vec<f32>) -> Result<()>;

    /// Remove a point.
    async fn delete(&self, key: &MemoryKey) -> Result<()>;

    /// Nearest neighbours by cosine similarity, best first.
    async fn search(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<MemoryHit>>;
}

/// qdrant-backed production store.
pub struct QdrantMemory {
    client: Qdrant,
}

impl QdrantMemory {
    pub fn connect(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .context("connecting to qdrant")?;
        Ok(Self { client })
    }

    fn point_id(key: &MemoryKey) -> PointId {
        match key {
            MemoryKey::Num(num) => PointId::from(*num),
            MemoryKey::Uuid(uuid) => PointId::from(uuid.clone()),
        }
    }

    fn payload_for(content: &str) -> Result<Payload> {
        Payload::try_from(json!({ "content": content }))
            .context("building long-term memory payload")
    }
}

#[async_trait]
impl VectorMemory for QdrantMemory {
    async fn ensure_ready(&self) -> Result<()> {
        if self.client.collection_exists(LONG_TERM_COLLECTION).await? {
            return Ok(());
        }
        self.client
            .create_collection(
                CreateCollectionBuilder::new(LONG_TERM_COLLECTION).vectors_config(
                    VectorParamsBuilder::new(EMBEDDING_DIM as u64, Distance::Cosine),
                ),
            )
            .await
            .context("creating long-term memory collection")?;
        info!(collection = LONG_TERM_COLLECTION, "vector collection created");
        Ok(())
    }

    async fn add(&self, content: &str, vector: Vec<f32>) -> Result<()> {
        let point = PointStruct::new(
            Uuid::new_v4().to_string(),
            vector,
            Self::payload_for(content)?,
        );
        self.client
            .upsert_points(UpsertPointsBuilder::new(LONG_TERM_COLLECTION, vec![point]).wait(true))
            .await
            .context("inserting long-term memory")?;
        debug!(chars = content.len(), "long-term memory added");
        Ok(())
    }

    async fn update(&self, key: &MemoryKey, content: &str, vector: Vec<f32>) -> Result<()> {
        let point = PointStruct::new(Self::point_id(key), vector, Self::payload_for(content)?);
        self.client
            .upsert_points(UpsertPointsBuilder::new(LONG_TERM_COLLECTION, vec![point]).wait(true))
            .await
            .context("updating long-term memory")?;
        Ok(())
    }

    async fn delete(&self, key: &MemoryKey) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(LONG_TERM_COLLECTION)
                    .points(PointsIdsList {
                        ids: vec![Self::point_id(key)],
                    })
                    .wait(true),
            )
            .await
            .context("deleting long-term memory")?;
        Ok(())
    }

    async fn search(&self, vector: Vec<f32>, top_k: usize) -> Result<Vec<MemoryHit>> {
        let response = self
            .client
            .query(
                QueryPointsBuilder::new(LONG_TERM_COLLECTION)
                    .query(vector)
                    .limit(top_k as u64)
                    .with_payload(true),
            )
            .await
            .context("searching long-term memory")?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|point| {
                let key = match point.id.and_then(|id| id.point_id_options)? {
                    PointIdOptions::Num(num) => MemoryKey::Num(num),
                    PointIdOptions::Uuid(uuid) => MemoryKey::Uuid(uuid),
                };
                let content = point.payload.get("content").and_then(|v| match &v.kind {
                    Some(Kind::StringValue(text)) => Some(text.clone()),
                    _ => None,
                })?;
                Some(MemoryHit {
                    key,
                    content,
                    score: point.score,
                })
            })
            .collect();
        Ok(hits)
    }
}
