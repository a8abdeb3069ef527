//! Core data models used throughout corpus-sync.
//!
//! These types represent the chunks, stored records, and reports that flow
//! through the synchronization and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller-asserted lifecycle status of an incoming chunk.
///
/// The reconciler trusts this classification but re-validates it against the
/// stored snapshot; a status that contradicts the snapshot is rejected rather
/// than silently reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Unchanged,
    Modified,
    #[default]
    New,
    Deleted,
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkStatus::Unchanged => "unchanged",
            ChunkStatus::Modified => "modified",
            ChunkStatus::New => "new",
            ChunkStatus::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A chunk submitted for reconciliation.
///
/// Produced by the upstream chunker, which is responsible for computing
/// `fingerprint` via [`crate::identity::fingerprint`]. Any metadata fields
/// beyond the fixed set are collected into `extra` and carried verbatim into
/// the stored payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingChunk {
    pub filename: String,
    pub filetype: String,
    /// 1-based position within the source document's chunking pass.
    pub ordinal: u32,
    pub content: String,
    pub fingerprint: String,
    /// Fingerprint of the chunk this one replaces; set only for edits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<String>,
    #[serde(default)]
    pub status: ChunkStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Identifier of a stored record in the backing index.
///
/// A session uses either dense numeric identifiers (continued from the
/// highest existing one) or opaque hex identifiers; the choice is made once
/// per reconciliation call from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Num(u64),
    Opaque(String),
}

impl RecordId {
    pub fn as_num(&self) -> Option<u64> {
        match self {
            RecordId::Num(n) => Some(*n),
            RecordId::Opaque(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Num(n) => write!(f, "{}", n),
            RecordId::Opaque(s) => f.write_str(s),
        }
    }
}

/// Payload stored alongside each indexed chunk.
///
/// `group_id` is the session partition key; every read and write is scoped by
/// it. The `extra` map holds caller-supplied metadata and participates in
/// drift comparison key-for-key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    pub fingerprint: String,
    pub filename: String,
    pub filetype: String,
    pub ordinal: u32,
    pub content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A chunk record as it exists in the backing store.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: RecordId,
    pub payload: ChunkPayload,
}

/// A chunk that failed status re-validation during reconciliation.
///
/// Rejection is per-chunk: the rest of the batch still proceeds.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedChunk {
    pub fingerprint: String,
    pub status: ChunkStatus,
    pub reason: String,
}

/// Outcome of one `synchronize` call.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Records written (new, modified, and drift-corrected chunks).
    pub applied: usize,
    /// Fingerprints removed from the session.
    pub deleted: usize,
    /// Unchanged chunks that required no write.
    pub skipped: usize,
    /// Unchanged chunks whose metadata drifted and were corrected in place.
    pub corrected: usize,
    pub rejected: Vec<RejectedChunk>,
}

/// A ranked retrieval result with its full stored payload.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub score: f32,
    #[serde(flatten)]
    pub chunk: ChunkPayload,
}

/// Summary of one session partition, derived from stored payloads.
#[derive(Debug, Clone, Serialize)]
pub struct SessionMeta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for (status, text) in [
            (ChunkStatus::Unchanged, "\"unchanged\""),
            (ChunkStatus::Modified, "\"modified\""),
            (ChunkStatus::New, "\"new\""),
            (ChunkStatus::Deleted, "\"deleted\""),
        ] {
            assert_eq!(serde_json::to_string(&status).unwrap(), text);
            let back: ChunkStatus = serde_json::from_str(text).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_incoming_chunk_collects_extra_fields() {
        let json = serde_json::json!({
            "filename": "notes.md",
            "filetype": "md",
            "ordinal": 3,
            "content": "hello",
            "fingerprint": "abc",
            "status": "new",
            "page_number": 2,
            "author": "sam",
        });
        let chunk: IncomingChunk = serde_json::from_value(json).unwrap();
        assert_eq!(chunk.ordinal, 3);
        assert_eq!(chunk.extra.get("page_number").unwrap(), 2);
        assert_eq!(
            chunk.extra.get("author").and_then(|v| v.as_str()),
            Some("sam")
        );
    }

    #[test]
    fn test_record_id_untagged_serde() {
        let num: RecordId = serde_json::from_str("42").unwrap();
        assert_eq!(num, RecordId::Num(42));
        let opaque: RecordId = serde_json::from_str("\"a1b2\"").unwrap();
        assert_eq!(opaque, RecordId::Opaque("a1b2".to_string()));
        assert_eq!(opaque.as_num(), None);
        assert_eq!(RecordId::Opaque("17".to_string()).as_num(), Some(17));
    }
}
