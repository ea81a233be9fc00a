//! Ingestion engine: walk a GitHub repository and persist its files.
//!
//! Two passes:
//!
//! 1. [`fetch_tree`] walks the contents API depth-first. A directory's
//!    children are fetched concurrently; a semaphore caps in-flight requests
//!    at `github.max_concurrent_requests` across the whole walk. File nodes
//!    carry name, path, size and extension, no content.
//! 2. [`persist_tree`] walks the snapshot depth-first again, fetching and
//!    decoding each file's content and writing one [`FileRecord`] per file.
//!    Any single fetch failure aborts the run.
//!
//! [`ingest_and_persist`] ties both together for a stored repository. Each
//! run replaces the repository's previous file records.

use anyhow::{Context, Result};
use futures::future::{try_join_all, BoxFuture};
use tokio::sync::Semaphore;

use repolens_core::models::{FileRecord, TreeNode};
use repolens_core::store::Store;

use crate::context::Services;
use crate::github::{decode_content, parse_repo_url, Contents, RepoHost};

/// Name given to the root directory node.
pub const ROOT_NAME: &str = "root";

/// Bounds on a directory walk.
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    pub max_concurrent_requests: usize,
    /// Directories nested deeper than this are recorded with no children.
    pub max_depth: usize,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 8,
            max_depth: 32,
        }
    }
}

struct Walk<'a> {
    host: &'a dyn RepoHost,
    owner: &'a str,
    repo: &'a str,
    max_depth: usize,
    permits: Semaphore,
}

/// Fetch the directory tree of `owner/repo`.
pub async fn fetch_tree(
    host: &dyn RepoHost,
    owner: &str,
    repo: &str,
    limits: WalkLimits,
) -> Result<TreeNode> {
    let walk = Walk {
        host,
        owner,
        repo,
        max_depth: limits.max_depth,
        permits: Semaphore::new(limits.max_concurrent_requests.max(1)),
    };
    fetch_node(&walk, ROOT_NAME.to_string(), String::new(), 0).await
}

fn fetch_node<'a>(
    walk: &'a Walk<'a>,
    name: String,
    path: String,
    depth: usize,
) -> BoxFuture<'a, Result<TreeNode>> {
    Box::pin(async move {
        let contents = {
            let _permit = walk.permits.acquire().await?;
            walk.host
                .get_contents(walk.owner, walk.repo, &path)
                .await
                .with_context(|| format!("Failed to list '{}'", path))?
        };

        let entries = match contents {
            Contents::File(entry) => {
                return Ok(TreeNode::file(&entry.name, &entry.path, entry.size));
            }
            Contents::Dir(entries) => entries,
        };

        let children = entries.into_iter().map(move |entry| -> BoxFuture<'a, Result<TreeNode>> {
            if !entry.is_dir {
                let node = TreeNode::file(&entry.name, &entry.path, entry.size);
                return Box::pin(async move { Ok(node) });
            }
            if depth + 1 > walk.max_depth {
                tracing::warn!(path = %entry.path, max_depth = walk.max_depth, "directory too deep, not descending");
                let node = TreeNode::Dir {
                    name: entry.name,
                    path: entry.path,
                    children: Vec::new(),
                };
                return Box::pin(async move { Ok(node) });
            }
            fetch_node(walk, entry.name, entry.path, depth + 1)
        });

        Ok(TreeNode::Dir {
            name,
            path,
            children: try_join_all(children).await?,
        })
    })
}

/// Fetch, decode and store the content of every file in `tree`, depth-first
/// in tree order. Returns the number of records written.
pub async fn persist_tree(
    host: &dyn RepoHost,
    store: &dyn Store,
    owner: &str,
    repo: &str,
    repo_id: &str,
    tree: &TreeNode,
) -> Result<usize> {
    let mut stack = vec![tree];
    let mut written = 0usize;

    while let Some(node) = stack.pop() {
        match node {
            TreeNode::Dir { children, .. } => stack.extend(children.iter().rev()),
            TreeNode::File {
                path,
                size,
                extension,
                ..
            } => {
                let body = host
                    .get_file_content(owner, repo, path)
                    .await
                    .with_context(|| format!("Error fetching file '{}'", path))?;
                let content = decode_content(&body)
                    .with_context(|| format!("Error decoding file '{}'", path))?;

                let record = FileRecord::new(repo_id, path, *size, extension, content);
                store.insert_file_record(&record).await?;
                written += 1;
                tracing::debug!(repo_id, path = %path, "stored file");
            }
        }
    }

    Ok(written)
}

/// Walk the repository, store the tree snapshot, and replace its file records.
pub async fn ingest_and_persist(services: &Services, repo_id: &str) -> Result<usize> {
    let repo = services.repository(repo_id).await?;
    let target = parse_repo_url(&repo.url)?;

    let limits = WalkLimits {
        max_concurrent_requests: services.config.github.max_concurrent_requests,
        max_depth: services.config.github.max_depth,
    };

    tracing::info!(repo_id, url = %repo.url, "ingestion started");
    let tree = fetch_tree(
        services.host.as_ref(),
        &target.owner,
        &target.name,
        limits,
    )
    .await?;
    services.store.set_file_tree(repo_id, &tree).await?;

    let removed = services.store.delete_file_records(repo_id).await?;
    if removed > 0 {
        tracing::debug!(repo_id, removed, "cleared previous file records");
    }

    let written = persist_tree(
        services.host.as_ref(),
        services.store.as_ref(),
        &target.owner,
        &target.name,
        repo_id,
        &tree,
    )
    .await?;

    tracing::info!(repo_id, files = written, "ingestion finished");
    Ok(written)
}
