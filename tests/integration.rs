//! End-to-end tests for the synchronization engine.
//!
//! These run the full pipeline — snapshot load, reconciliation, batched
//! writes, retrieval — against the in-memory store, proving the engine's
//! observable contract without a live vector backend.

use std::sync::Arc;

use corpus_sync::config::Config;
use corpus_sync::engine::SyncEngine;
use corpus_sync::identity::fingerprint;
use corpus_sync::models::{ChunkStatus, IncomingChunk, RecordId};
use corpus_sync::store::memory::MemoryStore;
use corpus_sync::store::{UpsertPoint, VectorStore};

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config() -> Config {
    toml::from_str(
        r#"[store]
url = "http://localhost:6334"

[sync]
batch_size = 20
"#,
    )
    .unwrap()
}

fn engine_with_store() -> (Arc<MemoryStore>, SyncEngine) {
    let store = Arc::new(MemoryStore::new());
    let engine = SyncEngine::new(store.clone(), Arc::new(test_config()));
    (store, engine)
}

fn chunk(filename: &str, ordinal: u32, content: &str, status: ChunkStatus) -> IncomingChunk {
    IncomingChunk {
        filename: filename.to_string(),
        filetype: "md".to_string(),
        ordinal,
        content: content.to_string(),
        fingerprint: fingerprint(filename, "md", ordinal, content),
        predecessor: None,
        status,
        extra: serde_json::Map::new(),
    }
}

// ─── End-to-end lifecycle ───────────────────────────────────────────

#[tokio::test]
async fn test_session_lifecycle() {
    let (store, engine) = engine_with_store();

    // Empty session: submit three new chunks.
    let c1 = chunk("a.md", 1, "first chunk", ChunkStatus::New);
    let c2 = chunk("a.md", 2, "second chunk", ChunkStatus::New);
    let c3 = chunk("b.md", 1, "third chunk", ChunkStatus::New);
    let (h1, h2, h3) = (
        c1.fingerprint.clone(),
        c2.fingerprint.clone(),
        c3.fingerprint.clone(),
    );

    let report = engine
        .synchronize("S1", None, &[c1.clone(), c2.clone(), c3.clone()], false)
        .await
        .unwrap();
    assert_eq!(report.applied, 3);
    assert_eq!(report.deleted, 0);
    assert!(report.rejected.is_empty());

    // Resubmit all three as unchanged: zero writes.
    let unchanged: Vec<IncomingChunk> = [c1, c2, c3]
        .into_iter()
        .map(|mut c| {
            c.status = ChunkStatus::Unchanged;
            c
        })
        .collect();
    let report = engine.synchronize("S1", None, &unchanged, false).await.unwrap();
    assert_eq!(report.applied, 0);
    assert_eq!(report.skipped, 3);

    // Edit the second chunk: one upsert reusing h2's identifier.
    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    let original_id = stored
        .iter()
        .find(|r| r.payload.fingerprint == h2)
        .unwrap()
        .id
        .clone();

    let mut edited = chunk("a.md", 2, "second chunk, revised", ChunkStatus::Modified);
    edited.predecessor = Some(h2.clone());
    let h2_new = edited.fingerprint.clone();

    let report = engine.synchronize("S1", None, &[edited], false).await.unwrap();
    assert_eq!(report.applied, 1);

    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    let revised = stored
        .iter()
        .find(|r| r.payload.fingerprint == h2_new)
        .unwrap();
    assert_eq!(revised.id, original_id);
    assert!(!stored.iter().any(|r| r.payload.fingerprint == h2));

    // Delete the first chunk.
    let mut doomed = chunk("a.md", 1, "first chunk", ChunkStatus::Deleted);
    doomed.fingerprint = h1.clone();
    let report = engine.synchronize("S1", None, &[doomed], false).await.unwrap();
    assert_eq!(report.deleted, 1);

    // The session now holds exactly {h2', h3}.
    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    let mut fingerprints: Vec<&str> = stored
        .iter()
        .map(|r| r.payload.fingerprint.as_str())
        .collect();
    fingerprints.sort();
    let mut expected = vec![h2_new.as_str(), h3.as_str()];
    expected.sort();
    assert_eq!(fingerprints, expected);
}

// ─── Idempotence ────────────────────────────────────────────────────

#[tokio::test]
async fn test_resubmitting_new_chunks_is_idempotent() {
    let (store, engine) = engine_with_store();
    let chunks = vec![
        chunk("a.md", 1, "alpha", ChunkStatus::New),
        chunk("a.md", 2, "beta", ChunkStatus::New),
    ];

    engine.synchronize("S1", None, &chunks, false).await.unwrap();
    let first = store.scroll(Some("S1"), 100).await.unwrap();

    // The same set submitted as `new` again reuses the stored identifiers.
    engine.synchronize("S1", None, &chunks, false).await.unwrap();
    let second = store.scroll(Some("S1"), 100).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    for record in &first {
        assert!(second.iter().any(|r| r.id == record.id
            && r.payload.fingerprint == record.payload.fingerprint));
    }
}

// ─── Identifier continuity ──────────────────────────────────────────

#[tokio::test]
async fn test_numeric_identifier_space_is_continued() {
    let (store, engine) = engine_with_store();

    // Pre-seed the session with numeric identifiers.
    let seeded = chunk("seed.md", 1, "seeded", ChunkStatus::New);
    store
        .upsert(vec![UpsertPoint {
            id: RecordId::Num(41),
            payload: corpus_sync::models::ChunkPayload {
                group_id: "S1".to_string(),
                session_name: None,
                fingerprint: seeded.fingerprint.clone(),
                filename: seeded.filename.clone(),
                filetype: seeded.filetype.clone(),
                ordinal: seeded.ordinal,
                content: seeded.content.clone(),
                extra: serde_json::Map::new(),
            },
        }])
        .await
        .unwrap();

    engine
        .synchronize(
            "S1",
            None,
            &[chunk("a.md", 1, "fresh", ChunkStatus::New)],
            false,
        )
        .await
        .unwrap();

    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    let fresh = stored
        .iter()
        .find(|r| r.payload.filename == "a.md")
        .unwrap();
    assert_eq!(fresh.id, RecordId::Num(42));
}

#[tokio::test]
async fn test_new_sessions_use_opaque_identifiers() {
    let (store, engine) = engine_with_store();
    engine
        .synchronize("S1", None, &[chunk("a.md", 1, "text", ChunkStatus::New)], false)
        .await
        .unwrap();

    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    assert!(matches!(stored[0].id, RecordId::Opaque(_)));
}

// ─── Deletion isolation ─────────────────────────────────────────────

#[tokio::test]
async fn test_deleting_one_chunk_leaves_siblings_untouched() {
    let (store, engine) = engine_with_store();

    // Two chunks of the same file, same type, different ordinals.
    let a = chunk("doc.md", 1, "part one", ChunkStatus::New);
    let b = chunk("doc.md", 2, "part two", ChunkStatus::New);
    let b_fingerprint = b.fingerprint.clone();
    engine
        .synchronize("S1", None, &[a.clone(), b], false)
        .await
        .unwrap();

    let mut doomed = a;
    doomed.status = ChunkStatus::Deleted;
    engine.synchronize("S1", None, &[doomed], false).await.unwrap();

    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].payload.fingerprint, b_fingerprint);
}

#[tokio::test]
async fn test_deletion_is_scoped_to_the_session() {
    let (store, engine) = engine_with_store();
    let shared = chunk("doc.md", 1, "same content", ChunkStatus::New);

    engine
        .synchronize("S1", None, &[shared.clone()], false)
        .await
        .unwrap();
    engine
        .synchronize("S2", None, &[shared.clone()], false)
        .await
        .unwrap();

    let mut doomed = shared;
    doomed.status = ChunkStatus::Deleted;
    engine.synchronize("S1", None, &[doomed], false).await.unwrap();

    assert!(store.scroll(Some("S1"), 100).await.unwrap().is_empty());
    assert_eq!(store.scroll(Some("S2"), 100).await.unwrap().len(), 1);
}

// ─── Lifecycle edge cases ───────────────────────────────────────────

#[tokio::test]
async fn test_deleted_fingerprint_can_be_resurrected_as_new() {
    let (store, engine) = engine_with_store();
    let original = chunk("doc.md", 1, "phoenix", ChunkStatus::New);

    engine
        .synchronize("S1", None, &[original.clone()], false)
        .await
        .unwrap();
    let first_id = store.scroll(Some("S1"), 100).await.unwrap()[0].id.clone();

    let mut doomed = original.clone();
    doomed.status = ChunkStatus::Deleted;
    engine.synchronize("S1", None, &[doomed], false).await.unwrap();
    assert!(store.scroll(Some("S1"), 100).await.unwrap().is_empty());

    // Freed fingerprint comes back under a fresh identifier.
    let report = engine
        .synchronize("S1", None, &[original], false)
        .await
        .unwrap();
    assert_eq!(report.applied, 1);
    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_ne!(stored[0].id, first_id);
}

#[tokio::test]
async fn test_integrity_violations_reject_only_the_offending_chunks() {
    let (_store, engine) = engine_with_store();

    let good = chunk("doc.md", 1, "fine", ChunkStatus::New);
    let bogus_unchanged = chunk("doc.md", 2, "never stored", ChunkStatus::Unchanged);
    let mut bogus_modified = chunk("doc.md", 3, "edit of nothing", ChunkStatus::Modified);
    bogus_modified.predecessor = Some("does-not-exist".to_string());

    let report = engine
        .synchronize(
            "S1",
            None,
            &[good, bogus_unchanged.clone(), bogus_modified.clone()],
            false,
        )
        .await
        .unwrap();

    assert_eq!(report.applied, 1);
    assert_eq!(report.rejected.len(), 2);
    let rejected: Vec<&str> = report
        .rejected
        .iter()
        .map(|r| r.fingerprint.as_str())
        .collect();
    assert!(rejected.contains(&bogus_unchanged.fingerprint.as_str()));
    assert!(rejected.contains(&bogus_modified.fingerprint.as_str()));
}

#[tokio::test]
async fn test_metadata_drift_is_corrected_not_rejected() {
    let (store, engine) = engine_with_store();
    let mut original = chunk("doc.md", 1, "stable content", ChunkStatus::New);
    original
        .extra
        .insert("page_number".to_string(), serde_json::json!(1));
    engine
        .synchronize("S1", None, &[original.clone()], false)
        .await
        .unwrap();

    let mut drifted = original;
    drifted.status = ChunkStatus::Unchanged;
    drifted
        .extra
        .insert("page_number".to_string(), serde_json::json!(2));

    let report = engine.synchronize("S1", None, &[drifted], false).await.unwrap();
    assert_eq!(report.corrected, 1);
    assert_eq!(report.applied, 1);
    assert!(report.rejected.is_empty());

    let stored = store.scroll(Some("S1"), 100).await.unwrap();
    assert_eq!(stored[0].payload.extra.get("page_number").unwrap(), 2);
}

// ─── Bulk import ────────────────────────────────────────────────────

#[tokio::test]
async fn test_bulk_import_appends_with_upload_stamps() {
    let (store, engine) = engine_with_store();
    let chunks = vec![
        chunk("a.md", 1, "uno", ChunkStatus::New),
        chunk("a.md", 2, "dos", ChunkStatus::New),
    ];

    let report = engine
        .synchronize("S1", Some("demo dataset"), &chunks, true)
        .await
        .unwrap();
    assert_eq!(report.applied, 2);

    for record in store.scroll(Some("S1"), 100).await.unwrap() {
        assert_eq!(record.payload.session_name.as_deref(), Some("demo dataset"));
        assert_eq!(
            record.payload.extra.get("source_type").and_then(|v| v.as_str()),
            Some("upload")
        );
        assert!(record.payload.extra.contains_key("ingested_at"));
    }
}

// ─── Retrieval ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_search_is_scoped_to_the_session() {
    let (_store, engine) = engine_with_store();
    engine
        .synchronize(
            "S1",
            None,
            &[chunk("a.md", 1, "rust borrow checker", ChunkStatus::New)],
            false,
        )
        .await
        .unwrap();
    engine
        .synchronize(
            "S2",
            None,
            &[chunk("b.md", 1, "python garbage collector", ChunkStatus::New)],
            false,
        )
        .await
        .unwrap();

    let hits = engine.search("S1", "borrow checker", Some(5)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk.filename, "a.md");

    let hits = engine.search("S2", "borrow checker", Some(5)).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_search_empty_session_returns_empty_not_error() {
    let (_store, engine) = engine_with_store();
    let hits = engine.search("ghost", "anything at all", None).await.unwrap();
    assert!(hits.is_empty());
}

// ─── Session management ─────────────────────────────────────────────

#[tokio::test]
async fn test_drop_session_removes_only_that_session() {
    let (_store, engine) = engine_with_store();
    engine
        .synchronize("S1", None, &[chunk("a.md", 1, "one", ChunkStatus::New)], false)
        .await
        .unwrap();
    engine
        .synchronize("S2", None, &[chunk("b.md", 1, "two", ChunkStatus::New)], false)
        .await
        .unwrap();

    engine.drop_session("S1").await.unwrap();

    assert!(!engine.session_exists("S1").await.unwrap());
    assert!(engine.session_exists("S2").await.unwrap());
    let sessions = engine.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, "S2");
}

#[tokio::test]
async fn test_concurrent_sync_on_different_sessions() {
    let (store, engine) = engine_with_store();
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..4u32 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let session = format!("S{}", i);
            let chunks = vec![
                chunk("doc.md", 1, &format!("session {} part one", i), ChunkStatus::New),
                chunk("doc.md", 2, &format!("session {} part two", i), ChunkStatus::New),
            ];
            engine.synchronize(&session, None, &chunks, false).await
        }));
    }
    for handle in handles {
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.applied, 2);
    }

    assert_eq!(store.scroll(None, 1000).await.unwrap().len(), 8);
}
