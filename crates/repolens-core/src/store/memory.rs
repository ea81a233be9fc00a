//! In-memory [`Store`] implementation for tests and dry runs.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Vectors and file
//! records are kept in `Vec`s so listing preserves insertion order.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use crate::error::RepolensError;
use crate::models::{
    ChatMessage, ChatSession, FileRecord, PipelineStatus, Repository, StatusField, Summary,
    TreeNode, VectorRecord,
};

use super::Store;

/// In-memory store. Cheap to construct; share it behind an `Arc`.
pub struct InMemoryStore {
    repos: RwLock<HashMap<String, Repository>>,
    files: RwLock<Vec<FileRecord>>,
    vectors: RwLock<Vec<VectorRecord>>,
    summaries: RwLock<HashMap<String, Summary>>,
    sessions: RwLock<HashMap<String, ChatSession>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            repos: RwLock::new(HashMap::new()),
            files: RwLock::new(Vec::new()),
            vectors: RwLock::new(Vec::new()),
            summaries: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Apply `f` to the repository `id`, or fail with `NotFound`.
    fn update_repo(&self, id: &str, f: impl FnOnce(&mut Repository)) -> Result<()> {
        let mut repos = write(&self.repos)?;
        let repo = repos
            .get_mut(id)
            .ok_or_else(|| RepolensError::not_found("Repository", id))?;
        f(repo);
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| RepolensError::Store("in-memory store lock poisoned".into()).into())
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| RepolensError::Store("in-memory store lock poisoned".into()).into())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_repository(&self, repo: &Repository) -> Result<Repository> {
        let mut repos = write(&self.repos)?;
        let existing_id = repos
            .values()
            .find(|r| r.url == repo.url && r.user_id == repo.user_id)
            .map(|r| r.id.clone());

        let existing = match existing_id {
            Some(id) => repos.get_mut(&id),
            None => None,
        };

        match existing {
            Some(stored) => {
                stored.owner = repo.owner.clone();
                stored.name = repo.name.clone();
                stored.description = repo.description.clone();
                stored.stars = repo.stars;
                stored.forks = repo.forks;
                stored.watchers = repo.watchers;
                stored.commit_count = repo.commit_count;
                stored.branches = repo.branches.clone();
                stored.contributors = repo.contributors.clone();
                stored.languages = repo.languages.clone();
                stored.last_synced = repo.last_synced;
                Ok(stored.clone())
            }
            None => {
                repos.insert(repo.id.clone(), repo.clone());
                Ok(repo.clone())
            }
        }
    }

    async fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        Ok(read(&self.repos)?.get(id).cloned())
    }

    async fn set_status(
        &self,
        repo_id: &str,
        field: StatusField,
        status: PipelineStatus,
    ) -> Result<()> {
        self.update_repo(repo_id, |r| r.set_status(field, status))
    }

    async fn set_file_tree(&self, repo_id: &str, tree: &TreeNode) -> Result<()> {
        self.update_repo(repo_id, |r| r.file_tree = Some(tree.clone()))
    }

    async fn set_summary_ref(&self, repo_id: &str, summary_id: &str) -> Result<()> {
        self.update_repo(repo_id, |r| r.summary_id = Some(summary_id.to_string()))
    }

    async fn delete_file_records(&self, repo_id: &str) -> Result<u64> {
        let mut files = write(&self.files)?;
        let before = files.len();
        files.retain(|f| f.repo_id != repo_id);
        Ok((before - files.len()) as u64)
    }

    async fn insert_file_record(&self, file: &FileRecord) -> Result<()> {
        write(&self.files)?.push(file.clone());
        Ok(())
    }

    async fn list_file_records(&self, repo_id: &str) -> Result<Vec<FileRecord>> {
        Ok(read(&self.files)?
            .iter()
            .filter(|f| f.repo_id == repo_id)
            .cloned()
            .collect())
    }

    async fn delete_vectors(&self, repo_id: &str) -> Result<u64> {
        let mut vectors = write(&self.vectors)?;
        let before = vectors.len();
        vectors.retain(|v| v.repo_id != repo_id);
        Ok((before - vectors.len()) as u64)
    }

    async fn insert_vector(&self, vector: &VectorRecord) -> Result<()> {
        write(&self.vectors)?.push(vector.clone());
        Ok(())
    }

    async fn list_vectors(&self, repo_id: &str) -> Result<Vec<VectorRecord>> {
        Ok(read(&self.vectors)?
            .iter()
            .filter(|v| v.repo_id == repo_id)
            .cloned()
            .collect())
    }

    async fn count_vectors(&self, repo_id: &str) -> Result<u64> {
        Ok(read(&self.vectors)?
            .iter()
            .filter(|v| v.repo_id == repo_id)
            .count() as u64)
    }

    async fn insert_summary(&self, summary: &Summary) -> Result<()> {
        let mut summaries = write(&self.summaries)?;
        summaries.retain(|_, s| s.repo_id != summary.repo_id);
        summaries.insert(summary.id.clone(), summary.clone());
        Ok(())
    }

    async fn get_summary(&self, id: &str) -> Result<Option<Summary>> {
        Ok(read(&self.summaries)?.get(id).cloned())
    }

    async fn append_chat_turn(
        &self,
        repo_id: &str,
        question: &ChatMessage,
        answer: &ChatMessage,
    ) -> Result<ChatSession> {
        let mut sessions = write(&self.sessions)?;
        let session = sessions
            .entry(repo_id.to_string())
            .or_insert_with(|| ChatSession {
                id: uuid::Uuid::new_v4().to_string(),
                repo_id: repo_id.to_string(),
                messages: Vec::new(),
                created_at: Utc::now(),
            });
        session.messages.push(question.clone());
        session.messages.push(answer.clone());
        Ok(session.clone())
    }

    async fn get_chat_session(&self, repo_id: &str) -> Result<Option<ChatSession>> {
        Ok(read(&self.sessions)?.get(repo_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RepoMetadata, Role};

    fn repo(url: &str, user: &str, stars: u64) -> Repository {
        let meta = RepoMetadata {
            name: "demo".into(),
            stars,
            ..Default::default()
        };
        Repository::new(url, user, "octo", meta)
    }

    fn vector(repo_id: &str, path: &str) -> VectorRecord {
        VectorRecord {
            id: uuid::Uuid::new_v4().to_string(),
            repo_id: repo_id.into(),
            file_id: Some("f".into()),
            path: path.into(),
            chunk_index: 0,
            vector: vec![1.0, 0.0],
            preview: String::new(),
            content_hash: String::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_keeps_id_and_statuses() {
        let store = InMemoryStore::new();
        let first = store
            .upsert_repository(&repo("https://github.com/octo/demo", "u1", 1))
            .await
            .unwrap();
        store
            .set_status(&first.id, StatusField::Ai, PipelineStatus::Ready)
            .await
            .unwrap();

        let second = store
            .upsert_repository(&repo("https://github.com/octo/demo", "u1", 9))
            .await
            .unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.stars, 9);
        assert_eq!(second.ai_status, PipelineStatus::Ready);

        let other_user = store
            .upsert_repository(&repo("https://github.com/octo/demo", "u2", 1))
            .await
            .unwrap();
        assert_ne!(other_user.id, first.id);
    }

    #[tokio::test]
    async fn test_status_update_touches_one_field() {
        let store = InMemoryStore::new();
        let r = store
            .upsert_repository(&repo("https://github.com/octo/demo", "u1", 1))
            .await
            .unwrap();
        store
            .set_status(&r.id, StatusField::Embedding, PipelineStatus::Failed)
            .await
            .unwrap();
        let r = store.get_repository(&r.id).await.unwrap().unwrap();
        assert_eq!(r.embedding_status, PipelineStatus::Failed);
        assert_eq!(r.structure_status, PipelineStatus::Pending);
        assert_eq!(r.ai_status, PipelineStatus::Pending);
    }

    #[tokio::test]
    async fn test_set_status_on_missing_repo_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .set_status("nope", StatusField::Structure, PipelineStatus::Ready)
            .await
            .unwrap_err();
        let err = err.downcast_ref::<RepolensError>().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_vectors_listed_in_insertion_order_per_repo() {
        let store = InMemoryStore::new();
        for path in ["a", "b", "c"] {
            store.insert_vector(&vector("r1", path)).await.unwrap();
        }
        store.insert_vector(&vector("r2", "z")).await.unwrap();

        let paths: Vec<String> = store
            .list_vectors("r1")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.path)
            .collect();
        assert_eq!(paths, ["a", "b", "c"]);
        assert_eq!(store.count_vectors("r2").await.unwrap(), 1);

        assert_eq!(store.delete_vectors("r1").await.unwrap(), 3);
        assert_eq!(store.count_vectors("r1").await.unwrap(), 0);
        assert_eq!(store.count_vectors("r2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_summary_replaces_previous_for_same_repo() {
        use crate::models::{Complexity, SummaryFields};

        let store = InMemoryStore::new();
        let fields = |text: &str| SummaryFields {
            summary: text.into(),
            architecture: "Layered".into(),
            complexity: Complexity::Medium,
            potential_issues: Vec::new(),
        };
        let old = Summary::from_fields("r1", fields("old"));
        let other = Summary::from_fields("r2", fields("other"));
        let new = Summary::from_fields("r1", fields("new"));
        for s in [&old, &other, &new] {
            store.insert_summary(s).await.unwrap();
        }

        assert!(store.get_summary(&old.id).await.unwrap().is_none());
        assert_eq!(store.get_summary(&new.id).await.unwrap().unwrap().summary, "new");
        assert!(store.get_summary(&other.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_chat_turns_accumulate_in_one_session() {
        let store = InMemoryStore::new();
        assert!(store.get_chat_session("r1").await.unwrap().is_none());

        let q = ChatMessage::new(Role::User, "hi");
        let a = ChatMessage::new(Role::Assistant, "hello");
        let first = store.append_chat_turn("r1", &q, &a).await.unwrap();
        let second = store.append_chat_turn("r1", &q, &a).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[0].role, Role::User);
        assert_eq!(second.messages[1].role, Role::Assistant);
    }
}
