//! Error taxonomy for the synchronization engine.
//!
//! Store-level failures (unreachable backend, timeout) are always retryable
//! and never silently swallowed. A batch failure mid-write reports exactly
//! what was committed and what remains, so the caller can retry just the
//! remainder. Per-chunk integrity violations are *not* errors at this level:
//! they are carried in the [`SyncReport`](crate::models::SyncReport) so one
//! bad chunk cannot abort the whole reconciliation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The backing store is unreachable or timed out. Retryable with backoff.
    #[error("store unavailable: {0}")]
    Store(#[source] anyhow::Error),

    /// A write batch failed mid-stream. Batches before `failed_batch` are
    /// durably committed; `remaining` records (the failed batch and everything
    /// after it) were not applied and are safe to resubmit.
    #[error(
        "partial batch failure: {committed} records committed, batch {failed_batch} failed, {remaining} records unapplied"
    )]
    PartialBatch {
        committed: usize,
        failed_batch: usize,
        remaining: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the caller should retry the operation (with backoff).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Store(_) | Error::PartialBatch { .. })
    }
}
