//! Qdrant-backed [`VectorStore`] implementation.
//!
//! One collection holds every session, partitioned by the `group_id` payload
//! key. Three vector spaces are kept per record:
//!
//! | Name | Space | Role |
//! |------|-------|------|
//! | `dense` | cosine dense | semantic prefetch |
//! | `bm25` | IDF-modified sparse | lexical prefetch |
//! | `colbert` | max-sim multivector, HNSW disabled | fusion rerank |
//!
//! Vector data is supplied as inference [`Document`]s built from the chunk
//! content at write and query time, so representations always reflect the
//! current text. All RPCs share the client-level timeout from
//! [`StoreConfig`](crate::config::StoreConfig); a timeout surfaces as an
//! error, never a hang.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Document, Filter,
    HnswConfigDiffBuilder, Modifier, MultiVectorComparator, MultiVectorConfigBuilder, PointId,
    PointStruct, PrefetchQueryBuilder, Query, QueryPointsBuilder, ScrollPointsBuilder,
    SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder, Vector,
    VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};

use crate::config::{EmbeddingConfig, StoreConfig};
use crate::models::{ChunkPayload, RecordId, StoredChunk};

use super::{ScoredRecord, UpsertPoint, VectorStore};

/// Named dense vector used for the semantic prefetch.
pub const DENSE_VECTOR: &str = "dense";
/// Named sparse vector used for the lexical prefetch.
pub const SPARSE_VECTOR: &str = "bm25";
/// Named multivector used for the late-interaction rerank.
pub const LATE_VECTOR: &str = "colbert";

pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    embedding: EmbeddingConfig,
}

impl QdrantStore {
    pub fn connect(store: &StoreConfig, embedding: &EmbeddingConfig) -> Result<Self> {
        let mut builder =
            Qdrant::from_url(&store.url).timeout(Duration::from_secs(store.timeout_secs));
        if let Some(key) = &store.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .with_context(|| format!("Failed to build Qdrant client for {}", store.url))?;

        Ok(Self {
            client,
            collection: store.collection.clone(),
            embedding: embedding.clone(),
        })
    }

    fn session_filter(session_id: &str) -> Filter {
        Filter::must([Condition::matches("group_id", session_id.to_string())])
    }

    /// Inference documents for the three vector spaces of one chunk.
    fn vectors_for(&self, content: &str) -> HashMap<String, Vector> {
        HashMap::from([
            (
                DENSE_VECTOR.to_string(),
                Vector::from(Document::new(content, &self.embedding.dense_model)),
            ),
            (
                SPARSE_VECTOR.to_string(),
                Vector::from(Document::new(content, &self.embedding.sparse_model)),
            ),
            (
                LATE_VECTOR.to_string(),
                Vector::from(Document::new(content, &self.embedding.late_interaction_model)),
            ),
        ])
    }
}

fn record_id_to_point_id(id: &RecordId) -> PointId {
    match id {
        RecordId::Num(n) => PointId::from(*n),
        RecordId::Opaque(s) => PointId::from(s.clone()),
    }
}

fn point_id_to_record_id(id: PointId) -> Option<RecordId> {
    match id.point_id_options? {
        PointIdOptions::Num(n) => Some(RecordId::Num(n)),
        PointIdOptions::Uuid(s) => Some(RecordId::Opaque(s)),
    }
}

fn parse_payload(
    id: Option<PointId>,
    payload: HashMap<String, qdrant_client::qdrant::Value>,
) -> Option<StoredChunk> {
    let id = point_id_to_record_id(id?)?;
    let map: serde_json::Map<String, serde_json::Value> = payload
        .into_iter()
        .map(|(k, v)| (k, serde_json::Value::from(v)))
        .collect();
    let parsed: ChunkPayload = serde_json::from_value(serde_json::Value::Object(map)).ok()?;
    Some(StoredChunk { id, payload: parsed })
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_schema(&self) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            return Ok(());
        }

        let mut vectors = VectorsConfigBuilder::default();
        vectors.add_named_vector_params(
            DENSE_VECTOR,
            VectorParamsBuilder::new(self.embedding.dense_dims, Distance::Cosine),
        );
        vectors.add_named_vector_params(
            LATE_VECTOR,
            VectorParamsBuilder::new(self.embedding.late_interaction_dims, Distance::Cosine)
                .multivector_config(MultiVectorConfigBuilder::new(MultiVectorComparator::MaxSim))
                // Rerank-only space: never searched on its own index.
                .hnsw_config(HnswConfigDiffBuilder::default().m(0)),
        );

        let mut sparse = SparseVectorsConfigBuilder::default();
        sparse.add_named_vector_params(
            SPARSE_VECTOR,
            SparseVectorParamsBuilder::default().modifier(Modifier::Idf),
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(vectors)
                    .sparse_vectors_config(sparse),
            )
            .await
            .with_context(|| format!("Failed to create collection {}", self.collection))?;

        Ok(())
    }

    async fn scroll(&self, session_id: Option<&str>, limit: u32) -> Result<Vec<StoredChunk>> {
        let mut request = ScrollPointsBuilder::new(&self.collection)
            .limit(limit)
            .with_payload(true);
        if let Some(sid) = session_id {
            request = request.filter(Self::session_filter(sid));
        }

        let response = self.client.scroll(request).await?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| parse_payload(point.id, point.payload))
            .collect())
    }

    async fn upsert(&self, points: Vec<UpsertPoint>) -> Result<()> {
        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                let vectors = self.vectors_for(&p.payload.content);
                let json = serde_json::to_value(&p.payload)?;
                let payload = Payload::try_from(json)
                    .map_err(|e| anyhow::anyhow!("payload not a JSON object: {}", e))?;
                Ok(PointStruct::new(
                    record_id_to_point_id(&p.id),
                    vectors,
                    payload,
                ))
            })
            .collect::<Result<_>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await?;
        Ok(())
    }

    async fn delete_fingerprints(&self, session_id: &str, fingerprints: &[String]) -> Result<()> {
        let matches: Vec<Condition> = fingerprints
            .iter()
            .map(|h| Condition::matches("fingerprint", h.clone()))
            .collect();
        // group_id AND (any fingerprint): a colliding fingerprint in another
        // session stays untouched.
        let filter = Filter::all([
            Condition::matches("group_id", session_id.to_string()),
            Condition::from(Filter::should(matches)),
        ]);

        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(filter)
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(Self::session_filter(session_id))
                    .wait(true),
            )
            .await?;
        Ok(())
    }

    async fn query(
        &self,
        session_id: &str,
        question: &str,
        limit: u64,
        prefetch_limit: u64,
    ) -> Result<Vec<ScoredRecord>> {
        let filter = Self::session_filter(session_id);

        let dense_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(Document::new(
                question,
                &self.embedding.dense_model,
            )))
            .using(DENSE_VECTOR)
            .filter(filter.clone())
            .limit(prefetch_limit);
        let sparse_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(Document::new(
                question,
                &self.embedding.sparse_model,
            )))
            .using(SPARSE_VECTOR)
            .filter(filter.clone())
            .limit(prefetch_limit);

        let request = QueryPointsBuilder::new(&self.collection)
            .add_prefetch(dense_prefetch)
            .add_prefetch(sparse_prefetch)
            .query(Query::new_nearest(Document::new(
                question,
                &self.embedding.late_interaction_model,
            )))
            .using(LATE_VECTOR)
            .filter(filter)
            .with_payload(true)
            .limit(limit);

        let response = self.client.query(request).await?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| {
                let map: serde_json::Map<String, serde_json::Value> = point
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::from(v)))
                    .collect();
                let payload: ChunkPayload =
                    serde_json::from_value(serde_json::Value::Object(map)).ok()?;
                Some(ScoredRecord {
                    score: point.score,
                    payload,
                })
            })
            .collect())
    }
}
