//! # RepoLens
//!
//! Ingest a GitHub repository, embed its files, summarize it, and answer
//! questions about it with retrieval-augmented chat.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌────────────┐   ┌──────────────────┐   ┌──────────┐
//! │  GitHub  │──▶│   Ingest   │──▶│ Embed │ Summarize │──▶│  SQLite  │
//! │ REST API │   │ tree+files │   │ (run concurrently)│   │  Store   │
//! └──────────┘   └────────────┘   └──────────────────┘   └────┬─────┘
//!                                                              │
//!                                                     ┌────────┴───────┐
//!                                                     │ Chat: classify │
//!                                                     │ retrieve + LLM │
//!                                                     └────────────────┘
//! ```
//!
//! Pure logic (models, chunking, path filtering, ranking, summary parsing,
//! the `Store` trait) lives in `repolens-core`; this crate wires it to the
//! network, the database and the CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`context`] | Shared store and collaborator handles |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the `Store` trait |
//! | [`github`] | GitHub REST client and content decoding |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`llm`] | Chat-completion clients |
//! | [`ingest`] | Directory walk and file persistence |
//! | [`embed`] | Chunk and embed repository files |
//! | [`summarize`] | AI summary generation |
//! | [`chat`] | Intent classification and answer synthesis |
//! | [`pipeline`] | Background pipelines and their statuses |

pub mod chat;
pub mod config;
pub mod context;
pub mod db;
pub mod embed;
pub mod embedding;
pub mod github;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod pipeline;
pub mod sqlite_store;
pub mod summarize;

pub use repolens_core as core;
