//! Schema creation. Every statement is idempotent, so `repolens init` can
//! run against an existing database.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS repositories (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        user_id TEXT NOT NULL,
        owner TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        stars INTEGER NOT NULL DEFAULT 0,
        forks INTEGER NOT NULL DEFAULT 0,
        watchers INTEGER NOT NULL DEFAULT 0,
        commit_count INTEGER NOT NULL DEFAULT 0,
        branches_json TEXT NOT NULL DEFAULT '[]',
        contributors_json TEXT NOT NULL DEFAULT '[]',
        languages_json TEXT NOT NULL DEFAULT '[]',
        file_tree_json TEXT,
        summary_id TEXT,
        structure_status TEXT NOT NULL DEFAULT 'pending',
        ai_status TEXT NOT NULL DEFAULT 'pending',
        embedding_status TEXT NOT NULL DEFAULT 'pending',
        last_synced INTEGER NOT NULL,
        UNIQUE(url, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS files (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        repo_id TEXT NOT NULL,
        path TEXT NOT NULL,
        kind TEXT NOT NULL DEFAULT 'file',
        size INTEGER NOT NULL DEFAULT 0,
        extension TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        FOREIGN KEY (repo_id) REFERENCES repositories(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vectors (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        repo_id TEXT NOT NULL,
        file_id TEXT,
        path TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        dims INTEGER NOT NULL,
        embedding BLOB NOT NULL,
        preview TEXT NOT NULL DEFAULT '',
        content_hash TEXT NOT NULL DEFAULT '',
        created_at INTEGER NOT NULL,
        FOREIGN KEY (repo_id) REFERENCES repositories(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS summaries (
        id TEXT PRIMARY KEY,
        repo_id TEXT NOT NULL,
        summary TEXT NOT NULL,
        architecture TEXT NOT NULL,
        complexity TEXT NOT NULL,
        potential_issues_json TEXT NOT NULL DEFAULT '[]',
        created_at INTEGER NOT NULL,
        FOREIGN KEY (repo_id) REFERENCES repositories(id),
        UNIQUE(repo_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_sessions (
        id TEXT PRIMARY KEY,
        repo_id TEXT NOT NULL UNIQUE,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (repo_id) REFERENCES repositories(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (session_id) REFERENCES chat_sessions(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_files_repo_id ON files(repo_id)",
    "CREATE INDEX IF NOT EXISTS idx_vectors_repo_id ON vectors(repo_id)",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages(session_id)",
    // Databases created before summaries were unique per repository may hold
    // superseded rows; keep only the referenced one.
    r#"
    DELETE FROM summaries
    WHERE id NOT IN (SELECT summary_id FROM repositories WHERE summary_id IS NOT NULL)
      AND repo_id IN (SELECT repo_id FROM summaries GROUP BY repo_id HAVING COUNT(*) > 1)
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_summaries_repo_id ON summaries(repo_id)",
];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
