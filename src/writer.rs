//! Batched application of a reconciliation plan.
//!
//! Upserts are written in fixed-size groups, one bulk call per group; a
//! failing group stops the stream and reports what was committed and what
//! remains, without rolling anything back (batch-atomic, not call-atomic).
//! Deletions run as one filtered bulk delete after every upsert group has
//! landed, so a record that an upsert in the same call intends to keep is
//! never deleted out from under it. A no-op plan issues no RPC at all.

use tracing::debug;

use crate::error::Error;
use crate::reconcile::ReconcilePlan;
use crate::store::{UpsertPoint, VectorStore};

/// Counts of records actually written by one [`BatchWriter::apply`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub upserted: usize,
    pub deleted: usize,
}

pub struct BatchWriter<'a> {
    store: &'a dyn VectorStore,
    batch_size: usize,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn VectorStore, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Apply `plan` against the store.
    ///
    /// On a batch failure, returns [`Error::PartialBatch`] naming the failed
    /// batch index and the number of unapplied records; batches committed
    /// before the failure stay committed. Deletions are skipped when an
    /// upsert batch fails (they count toward `remaining` work the caller
    /// retries).
    pub async fn apply(
        &self,
        session_id: &str,
        plan: &ReconcilePlan,
    ) -> Result<WriteSummary, Error> {
        if plan.is_noop() {
            return Ok(WriteSummary {
                upserted: 0,
                deleted: 0,
            });
        }

        let total = plan.upserts.len();
        let mut committed = 0usize;

        for (batch_index, batch) in plan.upserts.chunks(self.batch_size).enumerate() {
            let points: Vec<UpsertPoint> = batch
                .iter()
                .map(|u| UpsertPoint {
                    id: u.id.clone(),
                    payload: u.payload.clone(),
                })
                .collect();

            if let Err(source) = self.store.upsert(points).await {
                return Err(Error::PartialBatch {
                    committed,
                    failed_batch: batch_index,
                    remaining: total - committed,
                    source,
                });
            }

            committed += batch.len();
            debug!(
                batch = batch_index,
                records = batch.len(),
                "upsert batch committed"
            );
        }

        if !plan.deletions.is_empty() {
            self.store
                .delete_fingerprints(session_id, &plan.deletions)
                .await
                .map_err(Error::Store)?;
            debug!(fingerprints = plan.deletions.len(), "bulk delete applied");
        }

        Ok(WriteSummary {
            upserted: committed,
            deleted: plan.deletions.len(),
        })
    }
}
