//! The reconciliation state machine.
//!
//! One call diffs an incoming chunk set against the stored snapshot and emits
//! the minimal write set: records to upsert (with resolved identifiers) and
//! fingerprints to delete. Classification is a single pass in input order;
//! every chunk sees only the pre-reconciliation snapshot, never records
//! emitted earlier in the same call.
//!
//! | status | snapshot | action |
//! |--------|----------|--------|
//! | any (bulk import) | ignored | fresh id, `source_type=upload`, timestamp |
//! | `deleted` | — | queue fingerprint for deletion |
//! | `modified` | predecessor present | reuse predecessor's id |
//! | `modified` | predecessor absent | reject (integrity violation) |
//! | `unchanged` | present, payload equal | skip |
//! | `unchanged` | present, payload drifted | in-place correction, reuse id |
//! | `unchanged` | absent | reject (integrity violation) |
//! | `new` | absent | fresh id |
//! | `new` | present | idempotent upsert, reuse id |
//!
//! Rejection is per-chunk; the rest of the batch proceeds. Drift is an
//! informational correction, not an error.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::models::{ChunkPayload, ChunkStatus, IncomingChunk, RecordId, RejectedChunk};
use crate::snapshot::{IdAllocator, SessionSnapshot};

/// Identifies the session a reconciliation call is writing into.
#[derive(Debug, Clone, Copy)]
pub struct SessionContext<'a> {
    pub session_id: &'a str,
    pub session_name: Option<&'a str>,
}

/// A record the writer should upsert, with its resolved identifier.
#[derive(Debug, Clone)]
pub struct PlannedUpsert {
    pub id: RecordId,
    pub payload: ChunkPayload,
}

/// Output of one reconciliation pass. Deletions are applied after upserts
/// are queued, so overlapping fingerprints within one call stay safe.
#[derive(Debug, Default)]
pub struct ReconcilePlan {
    pub upserts: Vec<PlannedUpsert>,
    pub deletions: Vec<String>,
    pub rejected: Vec<RejectedChunk>,
    pub skipped: usize,
    pub corrected: usize,
}

impl ReconcilePlan {
    /// True when applying this plan would issue no write at all.
    pub fn is_noop(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }
}

/// Classify every incoming chunk against the snapshot.
///
/// `bulk_import` marks a fresh file-set import: every chunk gets a new
/// identifier and an ingestion stamp, and the snapshot is never consulted
/// for replacement.
pub fn reconcile(
    session: &SessionContext<'_>,
    snapshot: &SessionSnapshot,
    ids: &mut IdAllocator,
    incoming: &[IncomingChunk],
    bulk_import: bool,
    now: DateTime<Utc>,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();

    for chunk in incoming {
        if bulk_import {
            let id = ids.next_id();
            let mut payload = build_payload(session, chunk, None);
            payload
                .extra
                .entry("source_type".to_string())
                .or_insert_with(|| "upload".into());
            payload
                .extra
                .entry("ingested_at".to_string())
                .or_insert_with(|| now.to_rfc3339().into());
            debug!(fingerprint = %chunk.fingerprint, id = %id, "bulk import: appending chunk");
            plan.upserts.push(PlannedUpsert { id, payload });
            continue;
        }

        match chunk.status {
            ChunkStatus::Deleted => {
                // Idempotent: a fingerprint already absent is a no-op delete.
                plan.deletions.push(chunk.fingerprint.clone());
            }

            ChunkStatus::Modified => {
                let predecessor = chunk
                    .predecessor
                    .as_deref()
                    .and_then(|p| snapshot.get(p));
                match predecessor {
                    Some(stored) => {
                        debug!(
                            predecessor = chunk.predecessor.as_deref().unwrap_or(""),
                            fingerprint = %chunk.fingerprint,
                            id = %stored.id,
                            "replacing chunk in place"
                        );
                        let payload =
                            build_payload(session, chunk, stored.payload.session_name.as_deref());
                        plan.upserts.push(PlannedUpsert {
                            id: stored.id.clone(),
                            payload,
                        });
                    }
                    None => plan.rejected.push(reject(
                        chunk,
                        "modified chunk names a predecessor the store has never seen",
                    )),
                }
            }

            ChunkStatus::Unchanged => match snapshot.get(&chunk.fingerprint) {
                Some(stored) => {
                    if payload_matches(&stored.payload, chunk) {
                        plan.skipped += 1;
                    } else {
                        info!(
                            fingerprint = %chunk.fingerprint,
                            id = %stored.id,
                            "metadata drift on unchanged chunk, correcting in place"
                        );
                        let payload =
                            build_payload(session, chunk, stored.payload.session_name.as_deref());
                        plan.upserts.push(PlannedUpsert {
                            id: stored.id.clone(),
                            payload,
                        });
                        plan.corrected += 1;
                    }
                }
                None => plan.rejected.push(reject(
                    chunk,
                    "unchanged chunk's fingerprint is absent from the stored snapshot",
                )),
            },

            ChunkStatus::New => {
                let id = match snapshot.get(&chunk.fingerprint) {
                    // Duplicate content resubmitted as new: idempotent upsert.
                    Some(stored) => stored.id.clone(),
                    None => ids.next_id(),
                };
                debug!(fingerprint = %chunk.fingerprint, id = %id, "inserting chunk");
                let payload = build_payload(session, chunk, None);
                plan.upserts.push(PlannedUpsert { id, payload });
            }
        }
    }

    for rejection in &plan.rejected {
        warn!(
            fingerprint = %rejection.fingerprint,
            status = %rejection.status,
            "rejected chunk: {}",
            rejection.reason
        );
    }

    plan
}

fn build_payload(
    session: &SessionContext<'_>,
    chunk: &IncomingChunk,
    stored_name: Option<&str>,
) -> ChunkPayload {
    ChunkPayload {
        group_id: session.session_id.to_string(),
        session_name: session
            .session_name
            .or(stored_name)
            .map(str::to_string),
        fingerprint: chunk.fingerprint.clone(),
        filename: chunk.filename.clone(),
        filetype: chunk.filetype.clone(),
        ordinal: chunk.ordinal,
        content: chunk.content.clone(),
        extra: chunk.extra.clone(),
    }
}

/// Field-for-field drift comparison: the fixed payload fields plus every key
/// the incoming chunk carries in its extension map. Keys present only in the
/// stored payload do not count as drift.
fn payload_matches(stored: &ChunkPayload, chunk: &IncomingChunk) -> bool {
    stored.filename == chunk.filename
        && stored.filetype == chunk.filetype
        && stored.ordinal == chunk.ordinal
        && stored.content == chunk.content
        && chunk
            .extra
            .iter()
            .all(|(k, v)| stored.extra.get(k) == Some(v))
}

fn reject(chunk: &IncomingChunk, reason: &str) -> RejectedChunk {
    RejectedChunk {
        fingerprint: chunk.fingerprint.clone(),
        status: chunk.status,
        reason: reason.to_string(),
    }
}
