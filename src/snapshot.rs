//! Session snapshot loading and identifier allocation.
//!
//! A snapshot is the complete set of records currently stored for one
//! session, keyed by fingerprint. It is read once per reconciliation call
//! through a single bounded scroll and treated as immutable for the whole
//! call; the engine never caches it beyond that.
//!
//! Loading the snapshot also freezes the session's identifier space: if any
//! stored identifier parses as an integer, new identifiers continue the
//! numeric sequence from `max + 1`; otherwise fresh opaque identifiers are
//! generated. New (empty) sessions default to opaque identifiers.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::Error;
use crate::models::{RecordId, StoredChunk};
use crate::store::VectorStore;

/// Immutable view of a session's stored chunks, keyed by fingerprint.
pub struct SessionSnapshot {
    by_fingerprint: HashMap<String, StoredChunk>,
}

impl SessionSnapshot {
    /// Read every stored record for `session_id` (bounded by `limit`) and
    /// derive the identifier allocator for this reconciliation call.
    ///
    /// A store failure propagates as a retryable [`Error::Store`]; an empty
    /// snapshot is only ever the genuine absence of records.
    pub async fn load(
        store: &dyn VectorStore,
        session_id: &str,
        limit: u32,
    ) -> Result<(Self, IdAllocator), Error> {
        let records = store
            .scroll(Some(session_id), limit)
            .await
            .map_err(Error::Store)?;

        let allocator = IdAllocator::from_existing(records.iter().map(|r| &r.id));

        let mut by_fingerprint = HashMap::with_capacity(records.len());
        for record in records {
            by_fingerprint.insert(record.payload.fingerprint.clone(), record);
        }

        Ok((Self { by_fingerprint }, allocator))
    }

    #[cfg(test)]
    pub fn from_records(records: Vec<StoredChunk>) -> Self {
        let mut by_fingerprint = HashMap::new();
        for record in records {
            by_fingerprint.insert(record.payload.fingerprint.clone(), record);
        }
        Self { by_fingerprint }
    }

    pub fn get(&self, fingerprint: &str) -> Option<&StoredChunk> {
        self.by_fingerprint.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.by_fingerprint.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

/// Generator for fresh record identifiers, frozen for one reconciliation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdAllocator {
    /// Dense numeric sequence continuing from the highest stored identifier.
    Numeric { next: u64 },
    /// Random opaque identifiers (hex-encoded UUIDs).
    Opaque,
}

impl IdAllocator {
    /// Inspect existing identifiers: any numeric one switches the session to
    /// the numeric space, continuing from `max + 1`.
    pub fn from_existing<'a, I: Iterator<Item = &'a RecordId>>(ids: I) -> Self {
        let max_numeric = ids.filter_map(RecordId::as_num).max();
        match max_numeric {
            Some(max) => IdAllocator::Numeric { next: max + 1 },
            None => IdAllocator::Opaque,
        }
    }

    pub fn next_id(&mut self) -> RecordId {
        match self {
            IdAllocator::Numeric { next } => {
                let id = RecordId::Num(*next);
                *next += 1;
                id
            }
            IdAllocator::Opaque => RecordId::Opaque(Uuid::new_v4().simple().to_string()),
        }
    }
}
