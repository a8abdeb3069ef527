//! Storage abstraction over the vector-indexed chunk store.
//!
//! The [`VectorStore`] trait defines the four operations the synchronization
//! and retrieval pipeline needs from a backend — bounded partition scans,
//! idempotent bulk upserts, filtered bulk deletes, and the prefetch/fusion
//! ranked query — enabling pluggable backends (Qdrant, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod qdrant;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkPayload, RecordId, StoredChunk};

/// A record queued for writing, with its resolved identifier.
///
/// Vector representations are not part of this type: the store derives them
/// from `payload.content` at write time, so embeddings are never cached
/// across reconciliation calls.
#[derive(Debug, Clone)]
pub struct UpsertPoint {
    pub id: RecordId,
    pub payload: ChunkPayload,
}

/// A ranked record returned from [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub score: f32,
    pub payload: ChunkPayload,
}

/// Abstract vector-capable document store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_schema`](VectorStore::ensure_schema) | Create the collection if missing |
/// | [`scroll`](VectorStore::scroll) | Bounded full scan, optionally by session |
/// | [`upsert`](VectorStore::upsert) | Bulk write, idempotent by record id |
/// | [`delete_fingerprints`](VectorStore::delete_fingerprints) | Bulk delete by fingerprint within a session |
/// | [`delete_session`](VectorStore::delete_session) | Remove an entire session partition |
/// | [`query`](VectorStore::query) | Two-stage prefetch plus reranked fusion |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the backing collection and its vector spaces if absent.
    /// Idempotent.
    async fn ensure_schema(&self) -> Result<()>;

    /// Scan stored records, scoped to one session when `session_id` is set.
    ///
    /// The scan is bounded by `limit`; an empty result means the partition
    /// genuinely holds no records (infrastructure failures are errors, never
    /// empty results).
    async fn scroll(&self, session_id: Option<&str>, limit: u32) -> Result<Vec<StoredChunk>>;

    /// Write a batch of records in one bulk call. Idempotent by id.
    async fn upsert(&self, points: Vec<UpsertPoint>) -> Result<()>;

    /// Delete every record whose fingerprint is in `fingerprints`, scoped to
    /// the session partition.
    async fn delete_fingerprints(&self, session_id: &str, fingerprints: &[String]) -> Result<()>;

    /// Delete all records for a session.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Ranked retrieval: two prefetch passes (dense semantic and sparse
    /// lexical, `prefetch_limit` candidates each) fused by a late-interaction
    /// rerank, scoped to the session. Returns at most `limit` records.
    async fn query(
        &self,
        session_id: &str,
        question: &str,
        limit: u64,
        prefetch_limit: u64,
    ) -> Result<Vec<ScoredRecord>>;
}
