//! SQLite-backed [`Store`] implementation.
//!
//! Lists (branches, contributors, languages, issues) and the file tree are
//! stored as JSON text; vectors as little-endian `f32` BLOBs. Listing order
//! comes from the `seq` autoincrement column, so it is insertion order.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use repolens_core::embedding::{blob_to_vec, vec_to_blob};
use repolens_core::error::RepolensError;
use repolens_core::models::{
    ChatMessage, ChatSession, Complexity, FileRecord, NodeKind, PipelineStatus, Repository, Role,
    StatusField, Summary, TreeNode, VectorRecord,
};
use repolens_core::store::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn update_repo_column(&self, repo_id: &str, sql: &str, value: Option<&str>) -> Result<()> {
        let result = sqlx::query(sql)
            .bind(value)
            .bind(repo_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepolensError::not_found("Repository", repo_id).into());
        }
        Ok(())
    }
}

fn from_ts(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn json_list(raw: &str) -> Result<Vec<String>> {
    serde_json::from_str(raw).context("Corrupt JSON list column")
}

fn repo_from_row(row: &SqliteRow) -> Result<Repository> {
    let tree: Option<String> = row.get("file_tree_json");
    let file_tree = match tree {
        Some(raw) => Some(serde_json::from_str::<TreeNode>(&raw).context("Corrupt file tree")?),
        None => None,
    };
    let status = |column: &str| -> Result<PipelineStatus> {
        let raw: String = row.get(column);
        Ok(raw.parse()?)
    };

    Ok(Repository {
        id: row.get("id"),
        url: row.get("url"),
        user_id: row.get("user_id"),
        owner: row.get("owner"),
        name: row.get("name"),
        description: row.get("description"),
        stars: row.get::<i64, _>("stars") as u64,
        forks: row.get::<i64, _>("forks") as u64,
        watchers: row.get::<i64, _>("watchers") as u64,
        commit_count: row.get::<i64, _>("commit_count") as u64,
        branches: json_list(row.get("branches_json"))?,
        contributors: json_list(row.get("contributors_json"))?,
        languages: json_list(row.get("languages_json"))?,
        file_tree,
        summary_id: row.get("summary_id"),
        structure_status: status("structure_status")?,
        ai_status: status("ai_status")?,
        embedding_status: status("embedding_status")?,
        last_synced: from_ts(row.get("last_synced")),
    })
}

fn role_from_str(raw: &str) -> Result<Role> {
    match raw {
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        other => Err(RepolensError::Store(format!("unknown chat role '{}'", other)).into()),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_repository(&self, repo: &Repository) -> Result<Repository> {
        let tree = repo
            .file_tree
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO repositories (id, url, user_id, owner, name, description,
                                      stars, forks, watchers, commit_count,
                                      branches_json, contributors_json, languages_json,
                                      file_tree_json, summary_id,
                                      structure_status, ai_status, embedding_status,
                                      last_synced)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url, user_id) DO UPDATE SET
                owner = excluded.owner,
                name = excluded.name,
                description = excluded.description,
                stars = excluded.stars,
                forks = excluded.forks,
                watchers = excluded.watchers,
                commit_count = excluded.commit_count,
                branches_json = excluded.branches_json,
                contributors_json = excluded.contributors_json,
                languages_json = excluded.languages_json,
                last_synced = excluded.last_synced
            "#,
        )
        .bind(&repo.id)
        .bind(&repo.url)
        .bind(&repo.user_id)
        .bind(&repo.owner)
        .bind(&repo.name)
        .bind(&repo.description)
        .bind(repo.stars as i64)
        .bind(repo.forks as i64)
        .bind(repo.watchers as i64)
        .bind(repo.commit_count as i64)
        .bind(serde_json::to_string(&repo.branches)?)
        .bind(serde_json::to_string(&repo.contributors)?)
        .bind(serde_json::to_string(&repo.languages)?)
        .bind(tree)
        .bind(&repo.summary_id)
        .bind(repo.structure_status.as_str())
        .bind(repo.ai_status.as_str())
        .bind(repo.embedding_status.as_str())
        .bind(repo.last_synced.timestamp())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM repositories WHERE url = ? AND user_id = ?")
            .bind(&repo.url)
            .bind(&repo.user_id)
            .fetch_one(&self.pool)
            .await?;
        repo_from_row(&row)
    }

    async fn get_repository(&self, id: &str) -> Result<Option<Repository>> {
        let row = sqlx::query("SELECT * FROM repositories WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(repo_from_row).transpose()
    }

    async fn set_status(
        &self,
        repo_id: &str,
        field: StatusField,
        status: PipelineStatus,
    ) -> Result<()> {
        // Column names come from a closed enum, never from input.
        let sql = format!("UPDATE repositories SET {} = ? WHERE id = ?", field.column());
        self.update_repo_column(repo_id, &sql, Some(status.as_str()))
            .await
    }

    async fn set_file_tree(&self, repo_id: &str, tree: &TreeNode) -> Result<()> {
        let json = serde_json::to_string(tree)?;
        self.update_repo_column(
            repo_id,
            "UPDATE repositories SET file_tree_json = ? WHERE id = ?",
            Some(&json),
        )
        .await
    }

    async fn set_summary_ref(&self, repo_id: &str, summary_id: &str) -> Result<()> {
        self.update_repo_column(
            repo_id,
            "UPDATE repositories SET summary_id = ? WHERE id = ?",
            Some(summary_id),
        )
        .await
    }

    async fn delete_file_records(&self, repo_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files WHERE repo_id = ?")
            .bind(repo_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_file_record(&self, file: &FileRecord) -> Result<()> {
        let kind = match file.kind {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
        };
        sqlx::query(
            r#"
            INSERT INTO files (id, repo_id, path, kind, size, extension, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file.id)
        .bind(&file.repo_id)
        .bind(&file.path)
        .bind(kind)
        .bind(file.size as i64)
        .bind(&file.extension)
        .bind(&file.content)
        .bind(file.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_file_records(&self, repo_id: &str) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(
            "SELECT id, repo_id, path, kind, size, extension, content, created_at \
             FROM files WHERE repo_id = ? ORDER BY seq ASC",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let kind: String = row.get("kind");
                FileRecord {
                    id: row.get("id"),
                    repo_id: row.get("repo_id"),
                    path: row.get("path"),
                    kind: if kind == "dir" {
                        NodeKind::Dir
                    } else {
                        NodeKind::File
                    },
                    size: row.get::<i64, _>("size") as u64,
                    extension: row.get("extension"),
                    content: row.get("content"),
                    created_at: from_ts(row.get("created_at")),
                }
            })
            .collect())
    }

    async fn delete_vectors(&self, repo_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM vectors WHERE repo_id = ?")
            .bind(repo_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_vector(&self, vector: &VectorRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vectors (id, repo_id, file_id, path, chunk_index, dims, embedding,
                                 preview, content_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&vector.id)
        .bind(&vector.repo_id)
        .bind(&vector.file_id)
        .bind(&vector.path)
        .bind(vector.chunk_index)
        .bind(vector.vector.len() as i64)
        .bind(vec_to_blob(&vector.vector))
        .bind(&vector.preview)
        .bind(&vector.content_hash)
        .bind(vector.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_vectors(&self, repo_id: &str) -> Result<Vec<VectorRecord>> {
        let rows = sqlx::query(
            "SELECT id, repo_id, file_id, path, chunk_index, embedding, preview, content_hash, \
             created_at FROM vectors WHERE repo_id = ? ORDER BY seq ASC",
        )
        .bind(repo_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                VectorRecord {
                    id: row.get("id"),
                    repo_id: row.get("repo_id"),
                    file_id: row.get("file_id"),
                    path: row.get("path"),
                    chunk_index: row.get("chunk_index"),
                    vector: blob_to_vec(&blob),
                    preview: row.get("preview"),
                    content_hash: row.get("content_hash"),
                    created_at: from_ts(row.get("created_at")),
                }
            })
            .collect())
    }

    async fn count_vectors(&self, repo_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vectors WHERE repo_id = ?")
            .bind(repo_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn insert_summary(&self, summary: &Summary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO summaries (id, repo_id, summary, architecture, complexity,
                                   potential_issues_json, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(repo_id) DO UPDATE SET
                id = excluded.id,
                summary = excluded.summary,
                architecture = excluded.architecture,
                complexity = excluded.complexity,
                potential_issues_json = excluded.potential_issues_json,
                created_at = excluded.created_at
            "#,
        )
        .bind(&summary.id)
        .bind(&summary.repo_id)
        .bind(&summary.summary)
        .bind(&summary.architecture)
        .bind(summary.complexity.as_str())
        .bind(serde_json::to_string(&summary.potential_issues)?)
        .bind(summary.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_summary(&self, id: &str) -> Result<Option<Summary>> {
        let row = sqlx::query("SELECT * FROM summaries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let complexity: String = row.get("complexity");
        Ok(Some(Summary {
            id: row.get("id"),
            repo_id: row.get("repo_id"),
            summary: row.get("summary"),
            architecture: row.get("architecture"),
            complexity: Complexity::from_label(&complexity).unwrap_or_default(),
            potential_issues: json_list(row.get("potential_issues_json"))?,
            created_at: from_ts(row.get("created_at")),
        }))
    }

    async fn append_chat_turn(
        &self,
        repo_id: &str,
        question: &ChatMessage,
        answer: &ChatMessage,
    ) -> Result<ChatSession> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO chat_sessions (id, repo_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(repo_id) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(repo_id)
        .bind(Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        let session_id: String =
            sqlx::query_scalar("SELECT id FROM chat_sessions WHERE repo_id = ?")
                .bind(repo_id)
                .fetch_one(&mut *tx)
                .await?;

        for message in [question, answer] {
            sqlx::query(
                "INSERT INTO chat_messages (session_id, role, content, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&session_id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(message.created_at.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_chat_session(repo_id)
            .await?
            .ok_or_else(|| RepolensError::not_found("Chat session", repo_id).into())
    }

    async fn get_chat_session(&self, repo_id: &str) -> Result<Option<ChatSession>> {
        let session = sqlx::query("SELECT id, created_at FROM chat_sessions WHERE repo_id = ?")
            .bind(repo_id)
            .fetch_optional(&self.pool)
            .await?;

        let session = match session {
            Some(row) => row,
            None => return Ok(None),
        };
        let session_id: String = session.get("id");

        let rows = sqlx::query(
            "SELECT role, content, created_at FROM chat_messages \
             WHERE session_id = ? ORDER BY seq ASC",
        )
        .bind(&session_id)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let role: String = row.get("role");
            messages.push(ChatMessage {
                role: role_from_str(&role)?,
                content: row.get("content"),
                created_at: from_ts(row.get("created_at")),
            });
        }

        Ok(Some(ChatSession {
            id: session_id,
            repo_id: repo_id.to_string(),
            messages,
            created_at: from_ts(session.get("created_at")),
        }))
    }
}
