//! Pipeline status controller.
//!
//! [`PipelineSupervisor::analyze`] registers a repository and starts its
//! three pipelines in the background:
//!
//! ```text
//! ingest ──ok──▶ ┬─ embed      (embedding_status)
//!   │            └─ summarize  (ai_status)
//!   └─err──▶ embedding_status / ai_status = failed   (cascade_ingest_failure)
//! ```
//!
//! Every stage goes through [`run_stage`], which writes exactly one terminal
//! status to the stage's own field. Stages never write each other's fields.

use std::future::Future;

use anyhow::Result;
use tokio::task::JoinSet;

use repolens_core::error::RepolensError;
use repolens_core::models::{PipelineStatus, Repository, StatusField};

use crate::context::Services;
use crate::embed::embed_repo;
use crate::github::parse_repo_url;
use crate::ingest::ingest_and_persist;
use crate::summarize::summarize;

/// Run one stage and record its outcome on `field`.
///
/// Returns `true` when the stage succeeded. A failed status write is
/// logged; it does not change the stage's own outcome.
pub async fn run_stage<T, F>(services: &Services, repo_id: &str, field: StatusField, stage: F) -> bool
where
    F: Future<Output = Result<T>>,
{
    let (status, ok) = match stage.await {
        Ok(_) => {
            tracing::info!(repo_id, stage = %field, "stage ready");
            (PipelineStatus::Ready, true)
        }
        Err(e) => {
            tracing::error!(repo_id, stage = %field, error = %format!("{:#}", e), "stage failed");
            (PipelineStatus::Failed, false)
        }
    };

    if let Err(e) = services.store.set_status(repo_id, field, status).await {
        tracing::error!(repo_id, stage = %field, error = %e, "could not record stage status");
    }
    ok
}

/// Ingest, then embed and summarize concurrently.
pub async fn run_pipelines(services: &Services, repo_id: &str) {
    let ingested = run_stage(
        services,
        repo_id,
        StatusField::Structure,
        ingest_and_persist(services, repo_id),
    )
    .await;

    if !ingested {
        if services.config.pipeline.cascade_ingest_failure {
            for field in [StatusField::Embedding, StatusField::Ai] {
                if let Err(e) = services
                    .store
                    .set_status(repo_id, field, PipelineStatus::Failed)
                    .await
                {
                    tracing::error!(repo_id, stage = %field, error = %e, "could not record stage status");
                }
            }
            tracing::warn!(repo_id, "ingestion failed, embedding and summarization marked failed");
        } else {
            tracing::warn!(repo_id, "ingestion failed, embedding and summarization not started");
        }
        return;
    }

    tokio::join!(
        run_stage(
            services,
            repo_id,
            StatusField::Embedding,
            embed_repo(services, repo_id)
        ),
        run_stage(
            services,
            repo_id,
            StatusField::Ai,
            summarize(services, repo_id)
        ),
    );
}

/// Owns the background pipeline tasks.
pub struct PipelineSupervisor {
    services: Services,
    tasks: JoinSet<()>,
}

impl PipelineSupervisor {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            tasks: JoinSet::new(),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Number of pipeline tasks not yet collected by [`Self::wait_all`].
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Register (or refresh) a repository and start its pipelines.
    ///
    /// Returns as soon as the record is stored with all three statuses
    /// `processing`; the pipelines keep running in the background.
    pub async fn analyze(&mut self, url: &str, user_id: &str) -> Result<Repository> {
        let target = parse_repo_url(url)?;
        if user_id.trim().is_empty() {
            return Err(RepolensError::Validation("owner must not be empty".into()).into());
        }

        let meta = self
            .services
            .host
            .get_metadata(&target.owner, &target.name)
            .await?;

        let candidate = Repository::new(&target.url, user_id, &target.owner, meta);
        let mut repo = self.services.store.upsert_repository(&candidate).await?;

        for field in StatusField::ALL {
            self.services
                .store
                .set_status(&repo.id, field, PipelineStatus::Processing)
                .await?;
            repo.set_status(field, PipelineStatus::Processing);
        }

        tracing::info!(repo_id = %repo.id, url = %repo.url, "analysis started");
        self.launch(&repo.id);
        Ok(repo)
    }

    /// Spawn the pipelines of an already-registered repository.
    pub fn launch(&mut self, repo_id: &str) {
        let services = self.services.clone();
        let repo_id = repo_id.to_string();
        self.tasks.spawn(async move {
            run_pipelines(&services, &repo_id).await;
        });
    }

    /// Wait for every launched task to finish.
    pub async fn wait_all(&mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    tracing::error!(error = %e, "pipeline task panicked");
                } else {
                    tracing::warn!(error = %e, "pipeline task cancelled");
                }
            }
        }
    }
}
