//! Storage abstraction for RepoLens.
//!
//! The [`Store`] trait defines every persistence operation the pipelines
//! need, so the same pipeline code runs against SQLite in the binary and
//! against [`memory::InMemoryStore`] in tests.
//!
//! Implementations must be `Send + Sync`: the embedding and summarization
//! pipelines write to the same store concurrently.
//!
//! # Field ownership
//!
//! [`set_status`](Store::set_status), [`set_file_tree`](Store::set_file_tree)
//! and [`set_summary_ref`](Store::set_summary_ref) each update a single
//! field of the repository record. A pipeline never rewrites the whole
//! record, so concurrent pipelines cannot clobber each other's status.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ChatMessage, ChatSession, FileRecord, PipelineStatus, Repository, StatusField, Summary,
    TreeNode, VectorRecord,
};

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_repository`](Store::upsert_repository) | Insert or refresh by `(url, user_id)` |
/// | [`set_status`](Store::set_status) | Update one pipeline status field |
/// | [`delete_file_records`](Store::delete_file_records) | Clear a repository's files before re-ingestion |
/// | [`list_vectors`](Store::list_vectors) | All vectors of a repository, insertion order |
/// | [`append_chat_turn`](Store::append_chat_turn) | Append a question/answer pair |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a repository, or refresh the metadata of the existing record
    /// with the same `(url, user_id)`.
    ///
    /// On conflict the stored id, statuses, tree, and summary reference are
    /// kept. Returns the record as stored.
    async fn upsert_repository(&self, repo: &Repository) -> Result<Repository>;

    async fn get_repository(&self, id: &str) -> Result<Option<Repository>>;

    /// Update a single status field. Fails with `NotFound` for an unknown id.
    async fn set_status(
        &self,
        repo_id: &str,
        field: StatusField,
        status: PipelineStatus,
    ) -> Result<()>;

    async fn set_file_tree(&self, repo_id: &str, tree: &TreeNode) -> Result<()>;

    async fn set_summary_ref(&self, repo_id: &str, summary_id: &str) -> Result<()>;

    /// Delete every file record of a repository. Returns the number removed.
    async fn delete_file_records(&self, repo_id: &str) -> Result<u64>;

    async fn insert_file_record(&self, file: &FileRecord) -> Result<()>;

    /// File records of a repository, in insertion order.
    async fn list_file_records(&self, repo_id: &str) -> Result<Vec<FileRecord>>;

    /// Delete every vector of a repository. Returns the number removed.
    async fn delete_vectors(&self, repo_id: &str) -> Result<u64>;

    async fn insert_vector(&self, vector: &VectorRecord) -> Result<()>;

    /// Vectors of a repository, in insertion order.
    async fn list_vectors(&self, repo_id: &str) -> Result<Vec<VectorRecord>>;

    async fn count_vectors(&self, repo_id: &str) -> Result<u64>;

    /// Store the summary of a repository, replacing any previous one.
    async fn insert_summary(&self, summary: &Summary) -> Result<()>;

    async fn get_summary(&self, id: &str) -> Result<Option<Summary>>;

    /// Append `question` then `answer` to the repository's chat session,
    /// creating the session on first use. Both messages land or neither.
    async fn append_chat_turn(
        &self,
        repo_id: &str,
        question: &ChatMessage,
        answer: &ChatMessage,
    ) -> Result<ChatSession>;

    async fn get_chat_session(&self, repo_id: &str) -> Result<Option<ChatSession>>;
}
