//! # corpus-sync
//!
//! Session-scoped chunk synchronization and hybrid retrieval over a
//! vector-indexed document store.
//!
//! corpus-sync keeps a remote hybrid-search index in step with the latest
//! chunk set of a named collection ("session"). Callers submit
//! content-addressed chunks tagged with a lifecycle status; the engine diffs
//! them against the stored snapshot, resolves stable identifiers across
//! edits, and applies the minimal write set in bounded batches. Retrieval
//! fuses dense, sparse-lexical, and late-interaction rankings into one
//! result list, scoped to a single session.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌───────────┐
//! │ Incoming │──▶│ Snapshot + │──▶│ Batched  │──▶│  Qdrant    │
//! │ chunks   │   │ Reconciler │   │ writer   │   │ dense+bm25 │
//! └──────────┘   └────────────┘   └──────────┘   │ +colbert   │
//!                                                └─────┬─────┘
//!                                 ┌────────────────────┤
//!                                 ▼                    ▼
//!                            ┌──────────┐        ┌──────────┐
//!                            │   CLI    │        │   HTTP   │
//!                            │ (corpus) │        │  server  │
//!                            └──────────┘        └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`identity`] | Content-addressed chunk fingerprints |
//! | [`snapshot`] | Session snapshot loading and id allocation |
//! | [`reconcile`] | The chunk classification state machine |
//! | [`writer`] | Bounded-batch write application |
//! | [`engine`] | Service object tying the pipeline together |
//! | [`store`] | Vector store abstraction (Qdrant, in-memory) |
//! | [`server`] | HTTP API |
//! | [`error`] | Error taxonomy |

pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod models;
pub mod reconcile;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod writer;
