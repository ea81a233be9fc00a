//! # RepoLens Core
//!
//! Shared logic for RepoLens: data models, the path filter, chunking,
//! the store abstraction, retrieval ranking, and tolerant parsing of
//! AI summaries.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Every
//! function here is either pure or goes through the [`store::Store`]
//! trait, so the pipelines in the `repolens` crate can be tested against
//! [`store::memory::InMemoryStore`].

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod models;
pub mod path_filter;
pub mod search;
pub mod store;
pub mod summary;
