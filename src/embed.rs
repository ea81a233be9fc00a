//! Embedding pipeline: chunk eligible files and store one vector per chunk,
//! then one `REPO_METADATA` vector describing the repository itself.
//!
//! A file's chunks go to the provider in batches of at most
//! `embedding.batch_size`. Each run clears the repository's previous vectors
//! first. Vectors are written as they are produced, so a failure part-way
//! through leaves the vectors stored so far in place.

use anyhow::{bail, Context, Result};
use chrono::Utc;

use repolens_core::chunk::{chunk_text, content_hash};
use repolens_core::models::{FileRecord, VectorRecord, REPO_METADATA_PATH};
use repolens_core::path_filter::should_embed;

use crate::context::Services;
use crate::embedding::EmbeddingProvider;

/// Counts from one embedding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub files: usize,
    pub chunks: usize,
}

impl EmbedReport {
    /// Chunk vectors plus the metadata vector.
    pub fn vectors(&self) -> usize {
        self.chunks + 1
    }
}

/// True if the file takes part in embedding.
pub fn is_eligible(file: &FileRecord) -> bool {
    !file.content.is_empty() && should_embed(&file.path, file.file_name())
}

/// Truncate `text` to at most `max_chars` characters.
fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

/// Embed `texts` and check the provider honoured count and dimensionality.
async fn embed_checked(
    embedder: &dyn EmbeddingProvider,
    texts: &[String],
    what: &str,
) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder
        .embed_batch(texts)
        .await
        .with_context(|| format!("Embedding failed for {}", what))?;

    if vectors.len() != texts.len() {
        bail!(
            "Embedding provider returned {} vectors for {} inputs ({})",
            vectors.len(),
            texts.len(),
            what
        );
    }
    if let Some(dims) = embedder.dims() {
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "Embedding provider returned a {}-dimensional vector, expected {} ({})",
                bad.len(),
                dims,
                what
            );
        }
    }
    Ok(vectors)
}

/// Rebuild the vector set of a repository.
pub async fn embed_repo(services: &Services, repo_id: &str) -> Result<EmbedReport> {
    let repo = services.repository(repo_id).await?;
    let chunking = &services.config.chunking;
    let preview_limit = chunking.preview_limit();
    let batch_size = services.config.embedding.batch_size.max(1);
    let embedder = services.embedder.as_ref();
    let store = services.store.as_ref();

    tracing::info!(repo_id, model = embedder.model_name(), "embedding started");

    let removed = store.delete_vectors(repo_id).await?;
    if removed > 0 {
        tracing::debug!(repo_id, removed, "cleared previous vectors");
    }

    let files = store.list_file_records(repo_id).await?;
    let mut report = EmbedReport::default();

    for file in files.iter().filter(|f| is_eligible(f)) {
        let chunks = chunk_text(&file.content, chunking.chunk_size, chunking.overlap_ratio);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(embed_checked(embedder, batch, &file.path).await?);
        }

        for (chunk, vector) in chunks.iter().zip(vectors) {
            let record = VectorRecord {
                id: uuid::Uuid::new_v4().to_string(),
                repo_id: repo_id.to_string(),
                file_id: Some(file.id.clone()),
                path: file.path.clone(),
                chunk_index: chunk.chunk_index,
                vector,
                preview: preview(&chunk.text, preview_limit),
                content_hash: chunk.hash.clone(),
                created_at: Utc::now(),
            };
            store.insert_vector(&record).await?;
        }

        tracing::debug!(repo_id, path = %file.path, chunks = chunks.len(), "embedded file");
        report.files += 1;
        report.chunks += chunks.len();
    }

    let metadata = repo.metadata_text();
    let mut vectors = embed_checked(embedder, &[metadata.clone()], REPO_METADATA_PATH).await?;
    let record = VectorRecord {
        id: uuid::Uuid::new_v4().to_string(),
        repo_id: repo_id.to_string(),
        file_id: None,
        path: REPO_METADATA_PATH.to_string(),
        chunk_index: 0,
        vector: vectors.remove(0),
        content_hash: content_hash(&metadata),
        preview: metadata,
        created_at: Utc::now(),
    };
    store.insert_vector(&record).await?;

    tracing::info!(
        repo_id,
        files = report.files,
        vectors = report.vectors(),
        "embedding finished"
    );
    Ok(report)
}
