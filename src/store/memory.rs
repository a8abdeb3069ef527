//! In-memory [`VectorStore`] implementation for testing.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. The ranked query
//! is brute-force term overlap over chunk content; it preserves the trait's
//! observable contract (session scoping, limits, empty-partition behavior)
//! without a vector backend.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{RecordId, StoredChunk};

use super::{ScoredRecord, UpsertPoint, VectorStore};

/// In-memory store keyed by record id.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordId, StoredChunk>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all sessions.
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn scroll(&self, session_id: Option<&str>, limit: u32) -> Result<Vec<StoredChunk>> {
        let records = self.records.read().unwrap();
        let mut out: Vec<StoredChunk> = records
            .values()
            .filter(|r| session_id.map_or(true, |sid| r.payload.group_id == sid))
            .cloned()
            .collect();
        // Deterministic order for tests.
        out.sort_by(|a, b| a.id.to_string().cmp(&b.id.to_string()));
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn upsert(&self, points: Vec<UpsertPoint>) -> Result<()> {
        let mut records = self.records.write().unwrap();
        for point in points {
            records.insert(
                point.id.clone(),
                StoredChunk {
                    id: point.id,
                    payload: point.payload,
                },
            );
        }
        Ok(())
    }

    async fn delete_fingerprints(&self, session_id: &str, fingerprints: &[String]) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.retain(|_, r| {
            r.payload.group_id != session_id
                || !fingerprints.contains(&r.payload.fingerprint)
        });
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut records = self.records.write().unwrap();
        records.retain(|_, r| r.payload.group_id != session_id);
        Ok(())
    }

    async fn query(
        &self,
        session_id: &str,
        question: &str,
        limit: u64,
        _prefetch_limit: u64,
    ) -> Result<Vec<ScoredRecord>> {
        let question_lower = question.to_lowercase();
        let terms: Vec<&str> = question_lower.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.read().unwrap();
        let mut hits: Vec<ScoredRecord> = records
            .values()
            .filter(|r| r.payload.group_id == session_id)
            .filter_map(|r| {
                let text = r.payload.content.to_lowercase();
                let matches = terms.iter().filter(|t| text.contains(*t)).count();
                if matches > 0 {
                    Some(ScoredRecord {
                        score: matches as f32 / terms.len() as f32,
                        payload: r.payload.clone(),
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.payload.fingerprint.cmp(&b.payload.fingerprint))
        });
        hits.truncate(limit as usize);
        Ok(hits)
    }
}
