//! Shared handles passed to every pipeline.

use anyhow::Result;
use std::sync::Arc;

use repolens_core::error::RepolensError;
use repolens_core::models::Repository;
use repolens_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::github::{GitHubClient, RepoHost};
use crate::llm::{create_llm, LlmClient};
use crate::migrate;
use crate::sqlite_store::SqliteStore;

/// Configuration plus the store and the three collaborators.
///
/// Cheap to clone; background tasks take their own copy so they do not
/// depend on the caller staying alive.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub host: Arc<dyn RepoHost>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmClient>,
}

impl Services {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        host: Arc<dyn RepoHost>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            host,
            embedder,
            llm,
        }
    }

    /// Production wiring: SQLite store (schema applied), GitHub REST client,
    /// and the configured embedding and LLM providers.
    pub async fn from_config(config: Config) -> Result<Self> {
        let pool = db::connect(&config).await?;
        migrate::migrate_pool(&pool).await?;

        let host = GitHubClient::new(&config.github)?;
        let embedder = create_provider(&config.embedding)?;
        let llm = create_llm(&config.llm)?;

        Ok(Self::new(
            config,
            Arc::new(SqliteStore::new(pool)),
            Arc::new(host),
            Arc::from(embedder),
            Arc::from(llm),
        ))
    }

    /// Load a repository or fail with `NotFound`.
    pub async fn repository(&self, repo_id: &str) -> Result<Repository> {
        self.store
            .get_repository(repo_id)
            .await?
            .ok_or_else(|| RepolensError::not_found("Repository", repo_id).into())
    }
}
