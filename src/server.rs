//! HTTP API over the synchronization engine.
//!
//! Thin JSON surface for the editor frontend: session listing and removal,
//! chunk inspection, incremental chunk updates, bulk imports, and hybrid
//! search. Raw file handling (upload, archive extraction, text extraction)
//! is deliberately not part of this server; callers submit already-chunked
//! documents.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Health check (returns version) |
//! | `GET` | `/sessions` | List sessions with chunk counts |
//! | `GET` | `/sessions/{id}` | Metadata for one session |
//! | `DELETE` | `/sessions/{id}` | Drop a session and all its chunks |
//! | `GET` | `/chunks/{id}` | Every stored chunk of a session |
//! | `POST` | `/chunks/update` | Reconcile an edited chunk set |
//! | `POST` | `/chunks/import` | Bulk-import a fresh chunk set |
//! | `POST` | `/search` | Hybrid retrieval scoped to a session |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "session missing: s9" } }
//! ```
//!
//! Codes: `bad_request` (400), `not_found` (404), `store_unavailable` (503,
//! retryable), `partial_write` (500, resubmit the remainder), `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::SyncEngine;
use crate::error::Error;
use crate::models::{IncomingChunk, SearchHit, SessionMeta, SyncReport};

/// Start the HTTP server on `bind` and serve until the process terminates.
pub async fn run_server(engine: Arc<SyncEngine>, bind: &str) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", get(handle_list_sessions))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_drop_session),
        )
        .route("/chunks/{id}", get(handle_session_chunks))
        .route("/chunks/update", post(handle_update_chunks))
        .route("/chunks/import", post(handle_import_chunks))
        .route("/search", post(handle_search))
        .layer(cors)
        .with_state(engine);

    println!("corpus-sync server listening on http://{}", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match &err {
            Error::Store(_) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "store_unavailable".to_string(),
                message: err.to_string(),
            },
            Error::PartialBatch { .. } => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "partial_write".to_string(),
                message: err.to_string(),
            },
            Error::Config(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request".to_string(),
                message: err.to_string(),
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Sessions ============

async fn handle_list_sessions(
    State(engine): State<Arc<SyncEngine>>,
) -> Result<Json<Vec<SessionMeta>>, AppError> {
    Ok(Json(engine.list_sessions().await?))
}

async fn handle_get_session(
    State(engine): State<Arc<SyncEngine>>,
    Path(id): Path<String>,
) -> Result<Json<SessionMeta>, AppError> {
    let sessions = engine.list_sessions().await?;
    sessions
        .into_iter()
        .find(|s| s.id == id)
        .map(Json)
        .ok_or_else(|| not_found(format!("session missing: {}", id)))
}

async fn handle_drop_session(
    State(engine): State<Arc<SyncEngine>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !engine.session_exists(&id).await? {
        return Err(not_found(format!("session missing: {}", id)));
    }
    engine.drop_session(&id).await?;
    Ok(Json(serde_json::json!({
        "status": "ok",
        "message": format!("session {} dropped", id),
    })))
}

// ============ Chunks ============

#[derive(Serialize)]
struct SessionChunksResponse {
    session_id: String,
    chunks: Vec<serde_json::Value>,
}

async fn handle_session_chunks(
    State(engine): State<Arc<SyncEngine>>,
    Path(id): Path<String>,
) -> Result<Json<SessionChunksResponse>, AppError> {
    if !engine.session_exists(&id).await? {
        return Err(not_found(format!("session missing: {}", id)));
    }
    let chunks = engine.session_chunks(&id).await?;
    let chunks = chunks
        .into_iter()
        .map(|c| serde_json::to_value(&c.payload).unwrap_or_default())
        .collect();
    Ok(Json(SessionChunksResponse {
        session_id: id,
        chunks,
    }))
}

#[derive(Deserialize)]
struct ChunkUpdateRequest {
    session_id: String,
    #[serde(default)]
    session_name: Option<String>,
    documents: Vec<IncomingChunk>,
}

async fn handle_update_chunks(
    State(engine): State<Arc<SyncEngine>>,
    Json(request): Json<ChunkUpdateRequest>,
) -> Result<Json<SyncReport>, AppError> {
    let report = engine
        .synchronize(
            &request.session_id,
            request.session_name.as_deref(),
            &request.documents,
            false,
        )
        .await?;
    Ok(Json(report))
}

async fn handle_import_chunks(
    State(engine): State<Arc<SyncEngine>>,
    Json(request): Json<ChunkUpdateRequest>,
) -> Result<Json<SyncReport>, AppError> {
    let report = engine
        .synchronize(
            &request.session_id,
            request.session_name.as_deref(),
            &request.documents,
            true,
        )
        .await?;
    Ok(Json(report))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    session_id: String,
    question: String,
    #[serde(default)]
    limit: Option<u64>,
}

#[derive(Serialize)]
struct SearchResponse {
    session_id: String,
    hits: Vec<SearchHit>,
}

async fn handle_search(
    State(engine): State<Arc<SyncEngine>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let hits = engine
        .search(&request.session_id, &request.question, request.limit)
        .await?;
    Ok(Json(SearchResponse {
        session_id: request.session_id,
        hits,
    }))
}
