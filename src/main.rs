//! # corpus-sync CLI (`corpus`)
//!
//! The `corpus` binary is the operational interface for corpus-sync. It
//! provides commands for collection initialization, chunk-set
//! synchronization, hybrid search, session management, and starting the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! corpus --config ./config/corpus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `corpus init` | Create the backing collection and its vector spaces |
//! | `corpus sessions` | List sessions with chunk counts |
//! | `corpus chunks <session>` | Dump every stored chunk of a session |
//! | `corpus sync <session> --file chunks.json` | Reconcile a chunk set |
//! | `corpus search "<query>" --session <id>` | Hybrid search within a session |
//! | `corpus drop <session>` | Remove a session and all its chunks |
//! | `corpus serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the collection
//! corpus init --config ./config/corpus.toml
//!
//! # Bulk-import freshly chunked documents
//! corpus sync demo --file ./chunks.json --bulk --name "demo dataset"
//!
//! # Apply an edited chunk set incrementally
//! corpus sync demo --file ./edited.json
//!
//! # Query one session
//! corpus search "deployment checklist" --session demo --limit 5
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use corpus_sync::config::load_config;
use corpus_sync::engine::SyncEngine;
use corpus_sync::models::IncomingChunk;
use corpus_sync::server::run_server;
use corpus_sync::store::qdrant::QdrantStore;

/// corpus-sync — session-scoped chunk synchronization and hybrid retrieval
/// over a vector store.
#[derive(Parser)]
#[command(
    name = "corpus",
    about = "Keep a session-scoped hybrid-search index synchronized with chunked document sets",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/corpus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the backing collection and its vector spaces. Idempotent.
    Init,

    /// List sessions with chunk counts.
    Sessions,

    /// Dump every stored chunk of a session as JSON.
    Chunks {
        /// Session identifier.
        session: String,
    },

    /// Reconcile a chunk set against a session.
    ///
    /// The file holds a JSON array of chunks, each carrying `filename`,
    /// `filetype`, `ordinal`, `content`, `fingerprint`, and a lifecycle
    /// `status` (`unchanged`, `modified`, `new`, `deleted`); `modified`
    /// chunks also name their `predecessor` fingerprint.
    Sync {
        /// Session identifier.
        session: String,

        /// Path to the JSON chunk set.
        #[arg(long)]
        file: PathBuf,

        /// Bulk import: append every chunk under a fresh identifier instead
        /// of diffing against stored state.
        #[arg(long)]
        bulk: bool,

        /// Human-readable session name stored with each chunk.
        #[arg(long)]
        name: Option<String>,
    },

    /// Hybrid search within one session.
    Search {
        /// The search query string.
        query: String,

        /// Session identifier to search in.
        #[arg(long)]
        session: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Remove a session and all of its chunks.
    Drop {
        /// Session identifier.
        session: String,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Arc::new(load_config(&cli.config)?);
    let store = Arc::new(QdrantStore::connect(&config.store, &config.embedding)?);
    let engine = Arc::new(SyncEngine::new(store, config.clone()));

    match cli.command {
        Commands::Init => {
            engine.init().await?;
            println!(
                "collection {} initialized at {}",
                config.store.collection, config.store.url
            );
        }

        Commands::Sessions => {
            let sessions = engine.list_sessions().await?;
            if sessions.is_empty() {
                println!("No sessions.");
            }
            for session in sessions {
                let name = session.name.as_deref().unwrap_or("(unnamed)");
                println!("{}  {}  chunks: {}", session.id, name, session.chunks);
            }
        }

        Commands::Chunks { session } => {
            let chunks = engine.session_chunks(&session).await?;
            let payloads: Vec<_> = chunks.iter().map(|c| &c.payload).collect();
            println!("{}", serde_json::to_string_pretty(&payloads)?);
        }

        Commands::Sync {
            session,
            file,
            bulk,
            name,
        } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read chunk file: {}", file.display()))?;
            let chunks: Vec<IncomingChunk> = serde_json::from_str(&content)
                .with_context(|| "Chunk file must be a JSON array of chunks")?;

            let report = engine
                .synchronize(&session, name.as_deref(), &chunks, bulk)
                .await?;

            println!("sync {}", session);
            println!("  applied: {}", report.applied);
            println!("  deleted: {}", report.deleted);
            println!("  skipped: {}", report.skipped);
            println!("  corrected: {}", report.corrected);
            for rejection in &report.rejected {
                println!(
                    "  rejected {} ({}): {}",
                    rejection.fingerprint, rejection.status, rejection.reason
                );
            }
            println!("ok");
        }

        Commands::Search {
            query,
            session,
            limit,
        } => {
            let hits = engine.search(&session, &query, limit).await?;
            if hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} / chunk {}",
                    i + 1,
                    hit.score,
                    hit.chunk.filename,
                    hit.chunk.ordinal
                );
                println!(
                    "    excerpt: \"{}\"",
                    excerpt(&hit.chunk.content).replace('\n', " ")
                );
                println!("    fingerprint: {}", hit.chunk.fingerprint);
                println!();
            }
        }

        Commands::Drop { session } => {
            if !engine.session_exists(&session).await? {
                anyhow::bail!("session not found: {}", session);
            }
            engine.drop_session(&session).await?;
            println!("session {} dropped", session);
        }

        Commands::Serve => {
            engine.init().await?;
            run_server(engine, &config.server.bind).await?;
        }
    }

    Ok(())
}

fn excerpt(text: &str) -> String {
    text.chars().take(160).collect()
}
