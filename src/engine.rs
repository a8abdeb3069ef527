//! The synchronization engine: the service object every surface (CLI, HTTP)
//! talks to.
//!
//! Holds the store handle and configuration explicitly — no ambient globals —
//! and is constructed once at process start. `synchronize` runs with
//! single-writer semantics per session: calls against the same session are
//! serialized through a per-session async lock, while different sessions
//! proceed in parallel. Retrieval and session reads take no lock and may run
//! concurrently with a write in progress (they observe either the pre- or
//! post-reconciliation state).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::error::Error;
use crate::models::{IncomingChunk, SearchHit, SessionMeta, StoredChunk, SyncReport};
use crate::reconcile::{reconcile, SessionContext};
use crate::snapshot::SessionSnapshot;
use crate::store::VectorStore;
use crate::writer::BatchWriter;

pub struct SyncEngine {
    store: Arc<dyn VectorStore>,
    config: Arc<Config>,
    session_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn VectorStore>, config: Arc<Config>) -> Self {
        Self {
            store,
            config,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create the backing collection if it does not exist yet. Idempotent.
    pub async fn init(&self) -> Result<(), Error> {
        self.store.ensure_schema().await.map_err(Error::Store)
    }

    fn session_lock(&self, session_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.session_locks.lock().unwrap();
        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Reconcile `incoming` against the stored state of `session_id` and
    /// apply the resulting write set in bounded batches.
    ///
    /// `bulk_import` marks a fresh file-set upload: every chunk is appended
    /// under a new identifier with an ingestion stamp.
    pub async fn synchronize(
        &self,
        session_id: &str,
        session_name: Option<&str>,
        incoming: &[IncomingChunk],
        bulk_import: bool,
    ) -> Result<SyncReport, Error> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let (snapshot, mut ids) =
            SessionSnapshot::load(self.store.as_ref(), session_id, self.config.sync.snapshot_limit)
                .await?;

        let session = SessionContext {
            session_id,
            session_name,
        };
        let plan = reconcile(&session, &snapshot, &mut ids, incoming, bulk_import, Utc::now());

        let writer = BatchWriter::new(self.store.as_ref(), self.config.sync.batch_size);
        let summary = writer.apply(session_id, &plan).await?;

        info!(
            session = session_id,
            applied = summary.upserted,
            deleted = summary.deleted,
            skipped = plan.skipped,
            corrected = plan.corrected,
            rejected = plan.rejected.len(),
            "session synchronized"
        );

        Ok(SyncReport {
            applied: summary.upserted,
            deleted: summary.deleted,
            skipped: plan.skipped,
            corrected: plan.corrected,
            rejected: plan.rejected,
        })
    }

    /// Hybrid retrieval scoped to one session. An empty or missing session
    /// yields an empty result set, not an error.
    pub async fn search(
        &self,
        session_id: &str,
        question: &str,
        k: Option<u64>,
    ) -> Result<Vec<SearchHit>, Error> {
        if question.trim().is_empty() {
            return Ok(Vec::new());
        }

        let limit = k.unwrap_or(self.config.retrieval.final_limit).max(1);
        let prefetch_limit = limit * self.config.retrieval.prefetch_multiplier;

        let hits = self
            .store
            .query(session_id, question, limit, prefetch_limit)
            .await
            .map_err(Error::Store)?;

        Ok(hits
            .into_iter()
            .map(|r| SearchHit {
                score: r.score,
                chunk: r.payload,
            })
            .collect())
    }

    pub async fn session_exists(&self, session_id: &str) -> Result<bool, Error> {
        let records = self
            .store
            .scroll(Some(session_id), 1)
            .await
            .map_err(Error::Store)?;
        Ok(!records.is_empty())
    }

    /// Remove every record stored for `session_id`.
    pub async fn drop_session(&self, session_id: &str) -> Result<(), Error> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;
        self.store
            .delete_session(session_id)
            .await
            .map_err(Error::Store)?;
        info!(session = session_id, "session dropped");
        Ok(())
    }

    /// All stored chunks for one session, up to the snapshot limit.
    pub async fn session_chunks(&self, session_id: &str) -> Result<Vec<StoredChunk>, Error> {
        self.store
            .scroll(Some(session_id), self.config.sync.snapshot_limit)
            .await
            .map_err(Error::Store)
    }

    /// Distinct sessions present in the store, with per-session metadata
    /// derived from payloads.
    pub async fn list_sessions(&self) -> Result<Vec<SessionMeta>, Error> {
        let records = self
            .store
            .scroll(None, self.config.sync.snapshot_limit)
            .await
            .map_err(Error::Store)?;

        let mut sessions: HashMap<String, SessionMeta> = HashMap::new();
        for record in records {
            let payload = record.payload;
            let ingested_at = payload
                .extra
                .get("ingested_at")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            let entry = sessions
                .entry(payload.group_id.clone())
                .or_insert_with(|| SessionMeta {
                    id: payload.group_id.clone(),
                    name: payload.session_name.clone(),
                    chunks: 0,
                    created_at: None,
                });
            entry.chunks += 1;
            if entry.name.is_none() {
                entry.name = payload.session_name;
            }
            if let Some(ts) = ingested_at {
                match &entry.created_at {
                    Some(existing) if *existing <= ts => {}
                    _ => entry.created_at = Some(ts),
                }
            }
        }

        let mut out: Vec<SessionMeta> = sessions.into_values().collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(out)
    }
}
